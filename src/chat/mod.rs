//! Query orchestration — one completed round-trip per user turn.
//!
//! [`ChatOrchestrator`] owns the scope's [`SessionRepository`] plus the
//! advisory loading/error state the presentation layer reads. It guarantees
//! at most one outstanding request per scope and applies responses to the
//! session captured at call time, so a user who switches (or deletes)
//! sessions mid-flight never gets a misplaced answer.

use crate::api::{QueryBackend, QueryRequest, QueryResponse};
use crate::sessions::{SessionRepository, Turn};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Advisory state for the presentation layer.
#[derive(Debug, Default)]
struct DispatchState {
    loading: bool,
    error: Option<String>,
}

/// How a `send_message` call was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The round-trip ran to completion (successfully or with an advisory error).
    Completed,
    /// Empty-after-trim input; rejected before any side effect.
    EmptyInput,
    /// Another request is in flight for this scope; rejected as a no-op.
    Busy,
    /// The scope has no current session (no authenticated identity).
    NoSession,
}

pub struct ChatOrchestrator {
    repo: Mutex<SessionRepository>,
    backend: Arc<dyn QueryBackend>,
    dispatch: Mutex<DispatchState>,
}

impl ChatOrchestrator {
    pub fn new(repo: SessionRepository, backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            repo: Mutex::new(repo),
            backend,
            dispatch: Mutex::new(DispatchState::default()),
        }
    }

    /// Exclusive access to the scope's repository, for session management
    /// commands. Never held across an await in this module.
    pub fn repository(&self) -> MutexGuard<'_, SessionRepository> {
        self.repo.lock()
    }

    /// Whether a request is currently in flight for this scope.
    pub fn is_loading(&self) -> bool {
        self.dispatch.lock().loading
    }

    /// The advisory error from the last send, if any.
    pub fn last_error(&self) -> Option<String> {
        self.dispatch.lock().error.clone()
    }

    /// Truncate the current session's timeline and clear the advisory error.
    pub fn clear_current_messages(&self) {
        let mut repo = self.repo.lock();
        if let Some(id) = repo.current_session_id().map(ToOwned::to_owned) {
            if let Err(e) = repo.clear_messages(&id) {
                tracing::warn!(error = %e, "failed to clear current session");
                return;
            }
        }
        self.dispatch.lock().error = None;
    }

    /// Send one user query through the answering service.
    ///
    /// The user turn is appended immediately (optimistic local echo); the
    /// assistant turn is appended when a valid answer arrives. Failures set
    /// the advisory error and leave the question visibly unanswered. The
    /// loading flag is reset on every path, and no retries are attempted.
    pub async fn send_message(&self, text: &str, index_hint: Option<&str>) -> SendOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SendOutcome::EmptyInput;
        }

        // Check-and-set under one lock acquisition: the in-flight invariant
        // is per scope, and this is the only place the flag is raised.
        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.loading {
                return SendOutcome::Busy;
            }
            dispatch.loading = true;
            dispatch.error = None;
        }

        // Capture the target session now; the answer goes to this id even if
        // the user switches sessions while the request is outstanding.
        let target_id = {
            let mut repo = self.repo.lock();
            match repo.current_session_id().map(ToOwned::to_owned) {
                Some(id) => {
                    repo.append_turns(&id, vec![Turn::user(trimmed)]);
                    id
                }
                None => {
                    self.dispatch.lock().loading = false;
                    return SendOutcome::NoSession;
                }
            }
        };

        let request = QueryRequest {
            query: trimmed.to_string(),
            index_name: index_hint.map(ToString::to_string),
        };
        let result = self.backend.query(&request).await;

        let error = match result {
            Ok(QueryResponse { answer, sources }) => {
                let appended = self
                    .repo
                    .lock()
                    .append_turns(&target_id, vec![Turn::assistant(answer, sources)]);
                if !appended {
                    tracing::debug!(session = %target_id, "answer arrived for deleted session");
                }
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "query failed");
                Some(e.to_string())
            }
        };

        let mut dispatch = self.dispatch.lock();
        dispatch.error = error;
        dispatch.loading = false;

        SendOutcome::Completed
    }
}
