//! SessionService - session lifecycle writes.
//!
//! Create, rename and delete go straight to the session API (they are not
//! debounced) but share the scheduler's confirmed version, so a rename does
//! not make the next queued save look stale.

use crate::conflict::ConflictHandler;
use crate::save_scheduler::SaveScheduler;
use drafter_core::error::{DrafterError, Result};
use drafter_core::session::{
    CURRENT_SCHEMA_VERSION, SessionApi, SessionPatch, SessionPayload, WritingSession,
};
use std::sync::Arc;

pub struct SessionService {
    api: Arc<dyn SessionApi>,
    scheduler: SaveScheduler,
    conflicts: Arc<ConflictHandler>,
}

impl SessionService {
    pub fn new(
        api: Arc<dyn SessionApi>,
        scheduler: SaveScheduler,
        conflicts: Arc<ConflictHandler>,
    ) -> Self {
        Self {
            api,
            scheduler,
            conflicts,
        }
    }

    /// Creates a session and registers it with the scheduler.
    pub async fn create(&self, name: &str, payload: SessionPayload) -> Result<WritingSession> {
        let name = validated_name(name)?;
        let session = self
            .api
            .create(name, payload, CURRENT_SCHEMA_VERSION)
            .await?;
        self.scheduler.register_loaded(&session);
        tracing::info!("[SessionService] Created session {} ({})", session.id, session.name);
        Ok(session)
    }

    /// Loads a session and registers it with the scheduler.
    pub async fn open(&self, session_id: &str) -> Result<WritingSession> {
        let session = self.api.get(session_id).await?;
        if session.schema_version > CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "[SessionService] Session {} has schema v{}, newer than v{}",
                session.id,
                session.schema_version,
                CURRENT_SCHEMA_VERSION
            );
        }
        self.scheduler.register_loaded(&session);
        Ok(session)
    }

    pub async fn rename(&self, session_id: &str, name: &str) -> Result<WritingSession> {
        let name = validated_name(name)?;
        let expected = self.expected_version(session_id)?;
        match self
            .api
            .update(session_id, SessionPatch::rename(name), expected)
            .await
        {
            Ok(session) => {
                self.scheduler.confirm_version(&session);
                tracing::debug!("[SessionService] Renamed {} to {}", session_id, session.name);
                Ok(session)
            }
            Err(e) => Err(self.route_error(session_id, e).await),
        }
    }

    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let expected = self.expected_version(session_id)?;
        match self.api.delete(session_id, expected).await {
            Ok(()) => {
                self.scheduler.forget(session_id);
                self.conflicts.forget(session_id);
                tracing::info!("[SessionService] Deleted session {}", session_id);
                Ok(())
            }
            Err(e) => Err(self.route_error(session_id, e).await),
        }
    }

    /// Refetches the session list.
    pub async fn list(&self) -> Result<Vec<WritingSession>> {
        self.conflicts.refresh_session_list().await
    }

    fn expected_version(&self, session_id: &str) -> Result<u64> {
        self.scheduler
            .confirmed_version(session_id)
            .ok_or_else(|| DrafterError::not_found("WritingSession", session_id))
    }

    async fn route_error(&self, session_id: &str, error: DrafterError) -> DrafterError {
        if error.is_version_conflict() {
            self.scheduler.mark_conflicted(session_id);
            self.conflicts.on_session_conflict(session_id, &error).await;
        }
        error
    }
}

fn validated_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DrafterError::validation("Session name must not be empty"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{Notice, Notifier};
    use drafter_infrastructure::InMemorySessionApi;
    use std::time::Duration;

    struct Fixture {
        api: Arc<InMemorySessionApi>,
        scheduler: SaveScheduler,
        service: SessionService,
        notices: tokio::sync::mpsc::UnboundedReceiver<Notice>,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(InMemorySessionApi::new());
        let (notifier, notices) = Notifier::channel();
        let conflicts = Arc::new(ConflictHandler::new(api.clone(), notifier.clone(), 10));
        let scheduler = SaveScheduler::new(
            api.clone(),
            conflicts.clone(),
            notifier,
            Duration::from_millis(800),
        );
        let service = SessionService::new(api.clone(), scheduler.clone(), conflicts);
        Fixture {
            api,
            scheduler,
            service,
            notices,
        }
    }

    #[tokio::test]
    async fn test_blank_name_never_reaches_the_api() {
        let fixture = fixture();
        let err = fixture
            .service
            .create(" \t", SessionPayload::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(fixture.api.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_keeps_queued_save_valid() {
        let fixture = fixture();
        let session = fixture
            .service
            .create("Draft", SessionPayload::default())
            .await
            .unwrap();

        fixture
            .scheduler
            .schedule_save(&session.id, SessionPayload::with_prompt("text"));
        let renamed = fixture.service.rename(&session.id, "Chapter 1").await.unwrap();
        assert_eq!(renamed.version, 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let stored = fixture.api.get(&session.id).await.unwrap();
        assert_eq!(stored.name, "Chapter 1");
        assert_eq!(stored.payload.prompt, "text");
        assert_eq!(stored.version, 3);
    }

    #[tokio::test]
    async fn test_stale_delete_is_routed_to_conflict_handler() {
        let mut fixture = fixture();
        let session = fixture
            .service
            .create("Draft", SessionPayload::default())
            .await
            .unwrap();
        fixture
            .api
            .update(&session.id, SessionPatch::rename("Elsewhere"), 1)
            .await
            .unwrap();

        let err = fixture.service.delete(&session.id).await.unwrap_err();
        assert!(err.is_version_conflict());
        assert!(fixture.scheduler.status(&session.id).conflicted);
        assert!(matches!(
            fixture.notices.try_recv().unwrap(),
            Notice::Conflict { .. }
        ));
        assert!(fixture.api.get(&session.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_forgets_session() {
        let fixture = fixture();
        let session = fixture
            .service
            .create("Draft", SessionPayload::default())
            .await
            .unwrap();
        fixture.service.delete(&session.id).await.unwrap();

        assert!(fixture.scheduler.confirmed_version(&session.id).is_none());
        assert!(fixture.service.list().await.unwrap().is_empty());
    }
}
