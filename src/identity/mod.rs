//! Local credential storage gating session visibility.
//!
//! The core never inspects identity beyond presence: a stored credential
//! means scopes load their sessions, an absent one means they are cleared.
//! Tokens live in a `credentials.json` next to the rest of the state dir,
//! restricted to owner-only on unix.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = "credentials.json";

/// A stored login: the bearer token plus the username it was issued to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// File-backed credential store.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(CREDENTIALS_FILE),
        }
    }

    /// The stored credential, if a login is present and readable.
    ///
    /// A malformed credential file is treated as logged-out rather than an
    /// error; the user can simply log in again.
    pub fn load(&self) -> Option<Credentials> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read credentials, treating as logged out");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!(error = %e, "credentials file is malformed, treating as logged out");
                None
            }
        }
    }

    /// Whether a login is present. This is the identity signal scopes consume.
    pub fn is_authenticated(&self) -> bool {
        self.load().is_some()
    }

    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let contents = serde_json::to_string(credentials)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        // Token-bearing file: owner-only.
        #[cfg(unix)]
        {
            use std::{fs::Permissions, os::unix::fs::PermissionsExt};
            let _ = std::fs::set_permissions(&self.path, Permissions::from_mode(0o600));
        }

        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}
