//! Scope-owned session repository backed by a [`StateStore`].
//!
//! The repository exclusively owns the in-memory session map for one scope.
//! Every mutation flows through its methods, which is what makes the
//! `updated_at` and persist-on-write invariants enforceable. Persistence
//! serializes the whole scope map on each mutation; writes are best-effort
//! (a failed write is logged, never fatal).

use super::types::{ScopeKey, Session, Turn};
use crate::store::StateStore;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub struct SessionRepository {
    scope: ScopeKey,
    store: Arc<dyn StateStore>,
    sessions: HashMap<String, Session>,
    current_id: Option<String>,
}

impl SessionRepository {
    /// Create an empty repository for `scope`. Call [`initialize`] before use.
    ///
    /// [`initialize`]: SessionRepository::initialize
    pub fn new(scope: ScopeKey, store: Arc<dyn StateStore>) -> Self {
        Self {
            scope,
            store,
            sessions: HashMap::new(),
            current_id: None,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Load this scope's sessions from durable storage.
    ///
    /// Without an authenticated identity the scope holds zero sessions and its
    /// persisted document is removed, so logout leaves no stale history
    /// reachable. With identity, an empty (or corrupt) scope synthesizes
    /// exactly one default session and persists it immediately.
    pub fn initialize(&mut self, authenticated: bool) {
        self.sessions.clear();
        self.current_id = None;

        let key = self.scope.storage_key();

        if !authenticated {
            if let Err(e) = self.store.remove(&key) {
                tracing::warn!(scope = %self.scope, error = %e, "failed to clear persisted sessions");
            }
            return;
        }

        if let Some(value) = self.store.load(&key) {
            match serde_json::from_value::<HashMap<String, Session>>(value) {
                Ok(revived) => self.sessions = revived,
                Err(e) => {
                    tracing::warn!(
                        scope = %self.scope,
                        error = %e,
                        "persisted sessions have unexpected shape, starting fresh"
                    );
                }
            }
        }

        if self.sessions.is_empty() {
            self.create_session();
            return;
        }

        // Most recently touched thread becomes current.
        self.current_id = self
            .sessions
            .values()
            .max_by_key(|s| s.updated_at)
            .map(|s| s.id.clone());

        tracing::info!(
            scope = %self.scope,
            sessions = self.sessions.len(),
            "restored sessions from storage"
        );
    }

    /// Allocate a new empty session, make it current, and persist.
    pub fn create_session(&mut self) -> String {
        let mut session = Session::new();
        // Timestamp ids are near-unique; disambiguate the pathological case.
        let mut n = 1;
        while self.sessions.contains_key(&session.id) {
            session.id = format!("{}-{n}", session.created_at.to_rfc3339());
            n += 1;
        }

        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.current_id = Some(id.clone());
        self.persist();
        id
    }

    /// Make `id` the current session. Unknown ids are ignored: selection is
    /// driven by transient UI state and must not fail the caller.
    pub fn select_session(&mut self, id: &str) {
        if self.sessions.contains_key(id) {
            self.current_id = Some(id.to_string());
        }
    }

    /// Rename a session. The new name must be non-empty after trimming.
    pub fn rename_session(&mut self, id: &str, new_name: &str) -> Result<()> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            bail!("session name cannot be empty");
        }

        match self.sessions.get_mut(id) {
            Some(session) => {
                session.name = trimmed.to_string();
                session.updated_at = chrono::Utc::now();
                self.persist();
                Ok(())
            }
            None => bail!("session not found: {id}"),
        }
    }

    /// Delete a session. Deleting the current session re-selects an arbitrary
    /// survivor, or synthesizes a fresh one when none remain — a scope is
    /// never left with zero sessions and no selection.
    pub fn delete_session(&mut self, id: &str) {
        if self.sessions.remove(id).is_none() {
            return;
        }
        self.persist();

        if self.current_id.as_deref() == Some(id) {
            match self.sessions.keys().next().cloned() {
                Some(next) => self.current_id = Some(next),
                None => {
                    self.create_session();
                }
            }
        }
    }

    /// Truncate a session's timeline to empty. The session itself survives.
    pub fn clear_messages(&mut self, id: &str) -> Result<()> {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.clear();
                self.persist();
                Ok(())
            }
            None => bail!("session not found: {id}"),
        }
    }

    /// Append turns to a session's timeline in order.
    ///
    /// Returns false for an unknown id: an in-flight answer whose target was
    /// deleted mid-flight is dropped rather than resurrected.
    pub fn append_turns(&mut self, id: &str, turns: Vec<Turn>) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.append(turns);
                self.persist();
                true
            }
            None => {
                tracing::debug!(session = id, "dropping turns for deleted session");
                false
            }
        }
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current_id.as_deref().and_then(|id| self.sessions.get(id))
    }

    /// The current session's timeline; empty when there is no current session.
    pub fn current_messages(&self) -> &[Turn] {
        self.current_session().map_or(&[], |s| &s.messages)
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions ordered by most recent activity first.
    pub fn sessions_by_recency(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Write the whole scope map back to durable storage. Best-effort.
    fn persist(&self) {
        let value = match serde_json::to_value(&self.sessions) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(scope = %self.scope, error = %e, "failed to serialize sessions");
                return;
            }
        };

        if let Err(e) = self.store.save(&self.scope.storage_key(), &value) {
            tracing::warn!(scope = %self.scope, error = %e, "failed to persist sessions");
        }
    }
}
