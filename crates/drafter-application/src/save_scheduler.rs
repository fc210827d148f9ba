//! SaveScheduler - debounced, single-flight session persistence.
//!
//! Edits are queued per session and flushed after a quiet period. At most
//! one save request is in flight at a time; when it succeeds the next queued
//! session is flushed right away. Every write carries the version the server
//! last confirmed, so a stale write fails as a conflict instead of
//! overwriting someone else's changes.
//!
//! # Queue rules
//!
//! - Scheduling a save for a session that already has one queued replaces
//!   the payload and keeps the session's position in the queue.
//! - A successful save removes the queue entry only if nothing newer was
//!   queued while the request was in flight.
//! - A conflicted session is skipped until the user resolves the conflict.
//! - A failed save stays queued; the next debounce retries it.

use crate::conflict::ConflictHandler;
use crate::debounce::DebounceTimer;
use crate::notice::{Notice, Notifier};
use chrono::{DateTime, Utc};
use drafter_core::error::{DrafterError, Result};
use drafter_core::session::{
    SavedSnapshot, SessionApi, SessionPatch, SessionPayload, WritingSession,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What the scheduler knows about the server copy of a session.
#[derive(Debug, Clone)]
struct ConfirmedState {
    version: u64,
    schema_version: u32,
    snapshot: SavedSnapshot,
    last_saved_at: Option<DateTime<Utc>>,
    conflicted: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: IndexMap<String, SessionPayload>,
    confirmed: HashMap<String, ConfirmedState>,
    in_flight: Option<String>,
}

/// Save progress for one session, for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveStatus {
    /// A payload is queued and not yet confirmed.
    pub pending: bool,
    /// A save request for this session is in flight.
    pub saving: bool,
    pub conflicted: bool,
    pub confirmed_version: Option<u64>,
    pub schema_version: Option<u32>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

struct SaveJob {
    session_id: String,
    payload: SessionPayload,
    expected_version: u64,
}

enum Step {
    Continue,
    Conflict(String, DrafterError),
    Stop,
}

/// Clears the in-flight marker if a save's future is dropped before it
/// finishes, so later flushes are not blocked forever.
struct FlightSlot<'a> {
    scheduler: &'a SaveScheduler,
    session_id: String,
}

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.scheduler.state();
        if state.in_flight.as_deref() == Some(self.session_id.as_str()) {
            tracing::debug!(
                "[SaveScheduler] Save for {} abandoned, releasing slot",
                self.session_id
            );
            state.in_flight = None;
        }
    }
}

struct Inner {
    api: Arc<dyn SessionApi>,
    conflicts: Arc<ConflictHandler>,
    notifier: Notifier,
    timer: DebounceTimer,
    state: Mutex<SchedulerState>,
}

/// Debounced save queue. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct SaveScheduler {
    inner: Arc<Inner>,
}

impl SaveScheduler {
    /// Binds the debounce timer to the current tokio runtime, so this must
    /// be called inside one.
    pub fn new(
        api: Arc<dyn SessionApi>,
        conflicts: Arc<ConflictHandler>,
        notifier: Notifier,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                conflicts,
                notifier,
                timer: DebounceTimer::new(debounce),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a session as loaded from the server. Its payload becomes the
    /// baseline for the dirty check.
    pub fn register_loaded(&self, session: &WritingSession) {
        self.state().confirmed.insert(
            session.id.clone(),
            ConfirmedState {
                version: session.version,
                schema_version: session.schema_version,
                snapshot: SavedSnapshot::from(&session.payload),
                last_saved_at: None,
                conflicted: false,
            },
        );
        tracing::debug!(
            "[SaveScheduler] Registered session {} at v{}",
            session.id,
            session.version
        );
    }

    /// Takes the version from a write made outside the scheduler (a rename)
    /// without touching the dirty baseline.
    pub fn confirm_version(&self, session: &WritingSession) {
        if let Some(confirmed) = self.state().confirmed.get_mut(&session.id) {
            confirmed.version = session.version;
            confirmed.schema_version = session.schema_version;
        }
    }

    /// Drops everything known about a session, including a queued save.
    pub fn forget(&self, session_id: &str) {
        let queue_empty = {
            let mut state = self.state();
            state.confirmed.remove(session_id);
            state.pending.shift_remove(session_id);
            state.pending.is_empty()
        };
        if queue_empty {
            self.inner.timer.cancel();
        }
    }

    pub fn confirmed_version(&self, session_id: &str) -> Option<u64> {
        self.state().confirmed.get(session_id).map(|c| c.version)
    }

    /// True when `payload` differs from the last confirmed state. Sessions
    /// that were never loaded are always dirty.
    pub fn is_dirty(&self, session_id: &str, payload: &SessionPayload) -> bool {
        self.state()
            .confirmed
            .get(session_id)
            .is_none_or(|c| c.snapshot.differs_from(payload))
    }

    /// Queues `payload` and restarts the debounce.
    pub fn schedule_save(&self, session_id: &str, payload: SessionPayload) {
        self.state().pending.insert(session_id.to_string(), payload);
        tracing::debug!("[SaveScheduler] Save scheduled for {}", session_id);
        self.arm_timer();
    }

    /// Drops a queued save. Cancels the debounce when nothing is left.
    pub fn clear_pending_save(&self, session_id: &str) {
        let queue_empty = {
            let mut state = self.state();
            state.pending.shift_remove(session_id);
            state.pending.is_empty()
        };
        if queue_empty {
            self.inner.timer.cancel();
        }
    }

    /// Queues the payload when it is dirty, otherwise drops any queued save.
    /// Returns whether the payload was dirty.
    pub fn track_edit(&self, session_id: &str, payload: &SessionPayload) -> bool {
        let dirty = self.is_dirty(session_id, payload);
        if dirty {
            self.schedule_save(session_id, payload.clone());
        } else {
            self.clear_pending_save(session_id);
        }
        dirty
    }

    pub fn has_pending(&self) -> bool {
        !self.state().pending.is_empty()
    }

    pub fn status(&self, session_id: &str) -> SaveStatus {
        let state = self.state();
        let confirmed = state.confirmed.get(session_id);
        SaveStatus {
            pending: state.pending.contains_key(session_id),
            saving: state.in_flight.as_deref() == Some(session_id),
            conflicted: confirmed.is_some_and(|c| c.conflicted),
            confirmed_version: confirmed.map(|c| c.version),
            schema_version: confirmed.map(|c| c.schema_version),
            last_saved_at: confirmed.and_then(|c| c.last_saved_at),
        }
    }

    /// Marks a session conflicted after a write outside the scheduler was
    /// rejected. Its queued saves are held until the conflict is resolved.
    pub fn mark_conflicted(&self, session_id: &str) {
        if let Some(confirmed) = self.state().confirmed.get_mut(session_id) {
            confirmed.conflicted = true;
        }
    }

    fn arm_timer(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.timer.reset(move || async move {
            if let Some(inner) = weak.upgrade() {
                SaveScheduler { inner }.flush_next().await;
            }
        });
    }

    /// Saves queued sessions one at a time, oldest first, until the queue is
    /// empty or a save fails. Returns immediately if a save is already in
    /// flight; that save continues the queue when it finishes.
    pub async fn flush_next(&self) {
        while let Some(job) = self.begin_next() {
            let slot = FlightSlot {
                scheduler: self,
                session_id: job.session_id.clone(),
            };
            let result = self
                .inner
                .api
                .update(
                    &job.session_id,
                    SessionPatch::payload(job.payload.clone()),
                    job.expected_version,
                )
                .await;

            let step = self.finish(job, result);
            drop(slot);
            match step {
                Step::Continue => {}
                Step::Conflict(session_id, error) => {
                    self.inner
                        .conflicts
                        .on_session_conflict(&session_id, &error)
                        .await;
                }
                Step::Stop => return,
            }
        }
    }

    /// Skips the debounce and saves everything queued now.
    pub async fn flush_all(&self) {
        self.inner.timer.cancel();
        self.flush_next().await;
    }

    fn begin_next(&self) -> Option<SaveJob> {
        let mut state = self.state();
        if let Some(in_flight) = &state.in_flight {
            tracing::debug!(
                "[SaveScheduler] Save for {} in flight, not starting another",
                in_flight
            );
            return None;
        }

        let mut orphans = Vec::new();
        let mut job = None;
        for (session_id, payload) in &state.pending {
            match state.confirmed.get(session_id) {
                None => orphans.push(session_id.clone()),
                Some(confirmed) if confirmed.conflicted => {}
                Some(confirmed) => {
                    job = Some(SaveJob {
                        session_id: session_id.clone(),
                        payload: payload.clone(),
                        expected_version: confirmed.version,
                    });
                    break;
                }
            }
        }

        for session_id in orphans {
            tracing::warn!(
                "[SaveScheduler] Dropping save for unknown session {}",
                session_id
            );
            state.pending.shift_remove(&session_id);
        }

        if let Some(job) = &job {
            state.in_flight = Some(job.session_id.clone());
            tracing::debug!(
                "[SaveScheduler] Saving {} against v{}",
                job.session_id,
                job.expected_version
            );
        }
        job
    }

    fn finish(&self, job: SaveJob, result: Result<WritingSession>) -> Step {
        let mut state = self.state();
        state.in_flight = None;

        match result {
            Ok(saved) => {
                if let Some(confirmed) = state.confirmed.get_mut(&job.session_id) {
                    confirmed.version = saved.version;
                    confirmed.schema_version = saved.schema_version;
                    confirmed.snapshot = SavedSnapshot::from(&job.payload);
                    confirmed.last_saved_at = Some(Utc::now());
                }
                if state.pending.get(&job.session_id) == Some(&job.payload) {
                    state.pending.shift_remove(&job.session_id);
                }
                tracing::debug!(
                    "[SaveScheduler] Saved {} as v{}",
                    job.session_id,
                    saved.version
                );
                Step::Continue
            }
            Err(e) if e.is_version_conflict() => {
                if let Some(confirmed) = state.confirmed.get_mut(&job.session_id) {
                    confirmed.conflicted = true;
                }
                Step::Conflict(job.session_id, e)
            }
            Err(e) => {
                drop(state);
                tracing::warn!("[SaveScheduler] Save for {} failed: {}", job.session_id, e);
                self.inner.notifier.notify(Notice::SaveFailed {
                    session_id: job.session_id,
                    message: e.to_string(),
                });
                Step::Stop
            }
        }
    }

    /// Resolves a conflict by adopting the server copy. Queued local edits
    /// for the session are discarded.
    pub async fn reload_from_server(&self, session_id: &str) -> Result<WritingSession> {
        let server = self.inner.conflicts.take_server_copy(session_id).await?;
        let queue_empty = {
            let mut state = self.state();
            state.pending.shift_remove(session_id);
            state.pending.is_empty()
        };
        if queue_empty {
            self.inner.timer.cancel();
        }
        self.register_loaded(&server);
        tracing::info!(
            "[SaveScheduler] Reloaded {} from server at v{}",
            session_id,
            server.version
        );
        Ok(server)
    }

    /// Resolves a conflict by keeping local edits: the server version
    /// becomes the new precondition and any queued save is retried.
    pub async fn keep_local(&self, session_id: &str) -> Result<()> {
        let server = self.inner.conflicts.take_server_copy(session_id).await?;
        let retry = {
            let mut state = self.state();
            let confirmed = state
                .confirmed
                .get_mut(session_id)
                .ok_or_else(|| DrafterError::not_found("WritingSession", session_id))?;
            confirmed.version = server.version;
            confirmed.schema_version = server.schema_version;
            confirmed.snapshot = SavedSnapshot::from(&server.payload);
            confirmed.conflicted = false;
            state.pending.contains_key(session_id)
        };
        tracing::info!(
            "[SaveScheduler] Keeping local copy of {} over server v{}",
            session_id,
            server.version
        );
        if retry {
            self.arm_timer();
        }
        Ok(())
    }
}
