//! In-memory session API.
//!
//! Behaves like the session server: it serializes writes, assigns versions
//! and rejects writes whose precondition is stale.

use async_trait::async_trait;
use drafter_core::error::{DrafterError, Result};
use drafter_core::session::{SessionApi, SessionPatch, SessionPayload, WritingSession};
use std::collections::HashMap;
use tokio::sync::RwLock;

const ENTITY: &str = "WritingSession";

/// A versioned session store held in memory.
#[derive(Default)]
pub struct InMemorySessionApi {
    sessions: RwLock<HashMap<String, WritingSession>>,
}

impl InMemorySessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn check_version(session: &WritingSession, expected_version: u64) -> Result<()> {
    if session.version != expected_version {
        tracing::debug!(
            "[InMemorySessionApi] Rejecting write to {}: expected v{}, stored v{}",
            session.id,
            expected_version,
            session.version
        );
        return Err(DrafterError::conflict(
            ENTITY,
            session.id.clone(),
            expected_version,
            Some(session.version),
        ));
    }
    Ok(())
}

#[async_trait]
impl SessionApi for InMemorySessionApi {
    async fn create(
        &self,
        name: &str,
        payload: SessionPayload,
        schema_version: u32,
    ) -> Result<WritingSession> {
        if name.trim().is_empty() {
            return Err(DrafterError::validation("Session name must not be empty"));
        }

        let timestamp = now();
        let session = WritingSession {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            version: 1,
            schema_version,
            payload,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        tracing::debug!("[InMemorySessionApi] Created session {}", session.id);
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<WritingSession> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| DrafterError::not_found(ENTITY, session_id))
    }

    async fn update(
        &self,
        session_id: &str,
        patch: SessionPatch,
        expected_version: u64,
    ) -> Result<WritingSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| DrafterError::not_found(ENTITY, session_id))?;

        check_version(session, expected_version)?;

        patch.apply_to(session);
        session.version += 1;
        session.updated_at = now();
        Ok(session.clone())
    }

    async fn delete(&self, session_id: &str, expected_version: u64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| DrafterError::not_found(ENTITY, session_id))?;

        check_version(session, expected_version)?;

        sessions.remove(session_id);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<WritingSession>> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<WritingSession> = sessions.values().cloned().collect();
        all.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        all.truncate(limit);
        Ok(all)
    }
}
