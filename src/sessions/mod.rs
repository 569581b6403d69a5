//! Session management — scoped, persisted conversation threads.

pub mod repository;
pub mod types;

pub use repository::SessionRepository;
pub use types::{Citation, ScopeKey, Session, Surface, Turn, DEFAULT_SESSION_NAME};

use crate::store::StateStore;
use anyhow::Result;

/// Remove every surface's persisted session documents from `store`.
///
/// Logout uses this: index-qualified query scopes that were never opened in
/// this run still have documents on disk, and none of them may remain
/// readable to whoever logs in next.
pub fn purge_persisted_scopes(store: &dyn StateStore) -> Result<()> {
    for surface in [Surface::Chat, Surface::Query] {
        store.remove_prefixed(&surface.storage_prefix())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use std::sync::Arc;

    #[test]
    fn purge_clears_scopes_that_were_never_reopened() {
        let store = Arc::new(MemoryStateStore::new());

        let mut secret = SessionRepository::new(ScopeKey::query("secret"), store.clone());
        secret.initialize(true);
        let id = secret.current_session_id().unwrap().to_string();
        secret.append_turns(&id, vec![Turn::user("private question")]);
        drop(secret);

        let mut chat = SessionRepository::new(ScopeKey::chat(), store.clone());
        chat.initialize(true);
        let chat_id = chat.current_session_id().unwrap().to_string();
        chat.append_turns(&chat_id, vec![Turn::user("also private")]);
        drop(chat);

        purge_persisted_scopes(store.as_ref()).unwrap();

        // The next login starts every scope from scratch.
        let mut revived = SessionRepository::new(ScopeKey::query("secret"), store.clone());
        revived.initialize(true);
        assert_eq!(revived.len(), 1);
        assert!(revived.current_messages().is_empty());

        let mut revived_chat = SessionRepository::new(ScopeKey::chat(), store);
        revived_chat.initialize(true);
        assert!(revived_chat.current_messages().is_empty());
    }
}
