//! Durable key-value storage contract for scope state.

use anyhow::Result;
use serde_json::Value;

/// Durable storage for JSON documents keyed by a namespace string.
///
/// Writes are last-write-wins and expected to be cheap enough to call on
/// every mutation. A missing key is not an error, and unparsable stored
/// data must never crash the caller.
pub trait StateStore: Send + Sync {
    /// Load the document stored under `key`.
    ///
    /// Returns `None` for a missing key, and also for malformed stored data
    /// (logged and treated as absent).
    fn load(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous document.
    fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Delete the document stored under `key`. Missing keys are fine.
    fn remove(&self, key: &str) -> Result<()>;

    /// Delete every document whose key starts with `prefix`.
    ///
    /// Used to clear a whole family of scope documents at once, including
    /// ones the caller never opened and cannot enumerate by exact key.
    fn remove_prefixed(&self, prefix: &str) -> Result<()>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}
