//! File-backed state store: one JSON document per key under a state directory.

use super::traits::StateStore;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

/// A state store that writes each key to `<root>/<key>.json`.
pub struct LocalStateStore {
    root: PathBuf,
}

impl LocalStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // Scope keys may contain ':' (index-qualified scopes); keep filenames flat.
    fn sanitize(key: &str) -> String {
        key.replace([':', '/', '\\'], "_")
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::sanitize(key)))
    }
}

impl StateStore for LocalStateStore {
    fn load(&self, key: &str) -> Option<Value> {
        let path = self.key_path(key);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read state file, treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    key,
                    path = %path.display(),
                    error = %e,
                    "state file is not valid JSON, treating as absent"
                );
                None
            }
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create state directory {}", self.root.display()))?;

        let path = self.key_path(key);
        let contents = serde_json::to_string(value)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write state file {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove state file {}", path.display()))
            }
        }
    }

    fn remove_prefixed(&self, prefix: &str) -> Result<()> {
        let safe_prefix = Self::sanitize(prefix);
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to list state directory {}", self.root.display())
                })
            }
        };

        for entry in entries {
            let entry = entry.with_context(|| {
                format!("failed to list state directory {}", self.root.display())
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&safe_prefix) && name.ends_with(".json") {
                std::fs::remove_file(entry.path()).with_context(|| {
                    format!("failed to remove state file {}", entry.path().display())
                })?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn load_returns_none_for_missing_key() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        assert!(store.load("chat_sessions").is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        let doc = json!({"a": 1, "b": ["x", "y"]});
        store.save("chat_sessions", &doc).unwrap();
        assert_eq!(store.load("chat_sessions"), Some(doc));
    }

    #[test]
    fn malformed_json_is_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        std::fs::write(tmp.path().join("chat_sessions.json"), "{not json").unwrap();
        assert!(store.load("chat_sessions").is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        store.save("chat_sessions", &json!({})).unwrap();
        store.remove("chat_sessions").unwrap();
        assert!(store.load("chat_sessions").is_none());
        // Second remove of a now-missing key is fine.
        store.remove("chat_sessions").unwrap();
    }

    #[test]
    fn index_qualified_keys_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        store.save("query_sessions:a", &json!({"scope": "a"})).unwrap();
        store.save("query_sessions:b", &json!({"scope": "b"})).unwrap();

        assert_eq!(store.load("query_sessions:a"), Some(json!({"scope": "a"})));
        assert_eq!(store.load("query_sessions:b"), Some(json!({"scope": "b"})));
    }

    #[test]
    fn remove_prefixed_deletes_every_matching_document() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        store.save("query_sessions:a", &json!({})).unwrap();
        store.save("query_sessions:b", &json!({})).unwrap();
        store.save("chat_sessions", &json!({})).unwrap();

        store.remove_prefixed("query_sessions").unwrap();

        assert!(store.load("query_sessions:a").is_none());
        assert!(store.load("query_sessions:b").is_none());
        assert!(store.load("chat_sessions").is_some());
    }

    #[test]
    fn remove_prefixed_leaves_unrelated_files_alone() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        store.save("chat_sessions", &json!({})).unwrap();
        std::fs::write(tmp.path().join("credentials.json"), "{}").unwrap();

        store.remove_prefixed("chat_sessions").unwrap();
        store.remove_prefixed("query_sessions").unwrap();

        assert!(store.load("chat_sessions").is_none());
        assert!(tmp.path().join("credentials.json").exists());
    }

    #[test]
    fn remove_prefixed_on_missing_directory_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path().join("never-created"));
        store.remove_prefixed("chat_sessions").unwrap();
    }

    #[test]
    fn last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());

        store.save("k", &json!(1)).unwrap();
        store.save("k", &json!(2)).unwrap();
        assert_eq!(store.load("k"), Some(json!(2)));
    }
}
