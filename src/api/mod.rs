//! Backend client subsystem for the document Q&A service.
//!
//! The answering service is reached through the [`QueryBackend`] trait defined
//! in [`traits`]; [`http::HttpBackend`] is the production implementation.
//! Error bodies from the service are sanitized before they reach logs or the
//! advisory error surface.

pub mod http;
pub mod traits;

pub use http::{HttpBackend, TokenResponse, UserProfile};
pub use traits::{QueryBackend, QueryRequest, QueryResponse, ResponseShapeError};

use std::sync::Arc;

const MAX_API_ERROR_CHARS: usize = 200;

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_token_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub bearer-token-like material from backend error strings.
///
/// Redacts anything following a `Bearer ` marker and bare JWTs (`eyJ` prefix)
/// echoed back in error bodies.
pub fn scrub_token_patterns(input: &str) -> String {
    const PREFIXES: [&str; 2] = ["Bearer ", "eyJ"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize backend error text by scrubbing tokens and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_token_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized error from a failed HTTP response.
pub async fn api_error(operation: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{operation} failed ({status}): {sanitized}")
}

/// Create the default HTTP backend.
pub fn create_backend(
    base_url: &str,
    token: Option<&str>,
    timeout_secs: u64,
) -> Arc<dyn QueryBackend> {
    Arc::new(HttpBackend::new(base_url, token, timeout_secs))
}
