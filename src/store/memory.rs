//! In-memory state store backed by a mutex-protected hash map.
//!
//! Used by tests and anywhere durable persistence is not wanted.

use super::traits::StateStore;
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn remove_prefixed(&self, prefix: &str) -> Result<()> {
        self.entries.lock().retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_load_remove_cycle() {
        let store = MemoryStateStore::new();
        assert!(store.load("k").is_none());

        store.save("k", &json!({"v": true})).unwrap();
        assert_eq!(store.load("k"), Some(json!({"v": true})));

        store.remove("k").unwrap();
        assert!(store.load("k").is_none());
    }

    #[test]
    fn remove_prefixed_matches_key_prefix_only() {
        let store = MemoryStateStore::new();
        store.save("query_sessions:a", &json!(1)).unwrap();
        store.save("query_sessions:b", &json!(2)).unwrap();
        store.save("chat_sessions", &json!(3)).unwrap();

        store.remove_prefixed("query_sessions").unwrap();

        assert!(store.load("query_sessions:a").is_none());
        assert!(store.load("query_sessions:b").is_none());
        assert_eq!(store.load("chat_sessions"), Some(json!(3)));
    }
}
