//! HTTP client for the document Q&A backend.
//!
//! Speaks the backend's REST surface: bearer-authenticated JSON for queries,
//! form-encoded login at `/auth/token`, identity probe at `/auth/me`.

use super::traits::{QueryBackend, QueryRequest, QueryResponse};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Issued credential from a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

/// The authenticated user as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<&str>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(ToString::to_string),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("not logged in. Run `docchat login` first."))?;
        Ok(req.header("Authorization", format!("Bearer {token}")))
    }

    /// Exchange username/password for a bearer token.
    ///
    /// The token endpoint expects `application/x-www-form-urlencoded`.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.endpoint("/auth/token"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("login", response).await);
        }

        Ok(response.json().await?)
    }

    /// Fetch the authenticated user's profile.
    pub async fn me(&self) -> Result<UserProfile> {
        let response = self
            .apply_auth(self.client.get(self.endpoint("/auth/me")))?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("identity", response).await);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let response = self
            .apply_auth(self.client.post(self.endpoint("/documents/query")))?
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("query", response).await);
        }

        let body: serde_json::Value = response.json().await?;
        Ok(QueryResponse::from_value(&body)?)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(token: Option<&str>) -> HttpBackend {
        HttpBackend::new("http://localhost:8000/api", token, 30)
    }

    #[test]
    fn strips_trailing_slash() {
        let b = HttpBackend::new("http://localhost:8000/api/", None, 30);
        assert_eq!(b.endpoint("/documents/query"), "http://localhost:8000/api/documents/query");
    }

    #[test]
    fn endpoint_joins_paths() {
        let b = backend(None);
        assert_eq!(b.endpoint("/auth/me"), "http://localhost:8000/api/auth/me");
    }

    #[tokio::test]
    async fn query_fails_without_token() {
        let b = backend(None);
        let result = b
            .query(&QueryRequest {
                query: "anything".to_string(),
                index_name: None,
            })
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not logged in"));
    }

    #[tokio::test]
    async fn me_fails_without_token() {
        let b = backend(None);
        assert!(b.me().await.is_err());
    }

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"tok","token_type":"bearer"}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "tok");
        assert_eq!(parsed.token_type, "bearer");
    }

    #[test]
    fn user_profile_tolerates_missing_roles() {
        let json = r#"{"username":"alice"}"#;
        let parsed: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.username, "alice");
        assert!(parsed.roles.is_empty());
    }
}
