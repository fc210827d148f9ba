//! ConflictHandler - reacts to version-precondition failures.
//!
//! When the server rejects a write because its copy moved on, the handler
//! fetches the server's current state, refreshes the session list and tells
//! the user. It never retries the write and never touches local edits; the
//! user decides between reloading and keeping their copy.

use crate::notice::{Notice, Notifier, ResourceKind};
use drafter_core::error::{DrafterError, Result};
use drafter_core::session::{SessionApi, WritingSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ConflictState {
    /// Server copies fetched after a session conflict, by session id.
    server_copies: HashMap<String, WritingSession>,
    /// The most recently fetched session list.
    session_list: Vec<WritingSession>,
}

pub struct ConflictHandler {
    sessions: Arc<dyn SessionApi>,
    notifier: Notifier,
    list_limit: usize,
    state: Mutex<ConflictState>,
}

impl ConflictHandler {
    pub fn new(sessions: Arc<dyn SessionApi>, notifier: Notifier, list_limit: usize) -> Self {
        Self {
            sessions,
            notifier,
            list_limit,
            state: Mutex::new(ConflictState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ConflictState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handles a rejected session write.
    ///
    /// Refetches the session and the session list, then publishes a
    /// conflict notice. Fetch failures are logged; the notice is sent
    /// regardless.
    pub async fn on_session_conflict(&self, session_id: &str, error: &DrafterError) {
        tracing::warn!(
            "[ConflictHandler] Session {} conflicted: {}",
            session_id,
            error
        );

        let server_version = match self.sessions.get(session_id).await {
            Ok(server) => {
                let version = server.version;
                self.state()
                    .server_copies
                    .insert(session_id.to_string(), server);
                Some(version)
            }
            Err(e) => {
                tracing::warn!(
                    "[ConflictHandler] Failed to refetch session {}: {}",
                    session_id,
                    e
                );
                reported_version(error)
            }
        };

        if let Err(e) = self.refresh_session_list().await {
            tracing::warn!("[ConflictHandler] Failed to refresh session list: {}", e);
        }

        self.notifier.notify(Notice::Conflict {
            resource: ResourceKind::Session,
            id: session_id.to_string(),
            message: error.to_string(),
            server_version,
        });
    }

    /// Handles a rejected template or theme write. Callers invalidate their
    /// own caches before routing here.
    pub fn on_resource_conflict(&self, resource: ResourceKind, name: &str, error: &DrafterError) {
        tracing::warn!(
            "[ConflictHandler] {:?} '{}' conflicted: {}",
            resource,
            name,
            error
        );
        self.notifier.notify(Notice::Conflict {
            resource,
            id: name.to_string(),
            message: error.to_string(),
            server_version: reported_version(error),
        });
    }

    /// Takes the server copy fetched for a conflicted session, fetching it
    /// now if none is held.
    pub async fn take_server_copy(&self, session_id: &str) -> Result<WritingSession> {
        let held = self.state().server_copies.remove(session_id);
        match held {
            Some(server) => Ok(server),
            None => self.sessions.get(session_id).await,
        }
    }

    pub fn server_copy(&self, session_id: &str) -> Option<WritingSession> {
        self.state().server_copies.get(session_id).cloned()
    }

    pub fn forget(&self, session_id: &str) {
        self.state().server_copies.remove(session_id);
    }

    /// Refetches the session list and keeps it for [`session_list`](Self::session_list).
    pub async fn refresh_session_list(&self) -> Result<Vec<WritingSession>> {
        let sessions = self.sessions.list(self.list_limit).await?;
        self.state().session_list = sessions.clone();
        Ok(sessions)
    }

    pub fn session_list(&self) -> Vec<WritingSession> {
        self.state().session_list.clone()
    }
}

fn reported_version(error: &DrafterError) -> Option<u64> {
    match error {
        DrafterError::VersionConflict { actual, .. } => *actual,
        _ => None,
    }
}
