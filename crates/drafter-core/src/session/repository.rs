//! Session API trait.
//!
//! Defines the interface to the server that owns writing sessions.

use super::model::{SessionPatch, SessionPayload, WritingSession};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract client for the server-held writing session records.
///
/// The server serializes writes and assigns a monotonically increasing
/// `version` to every session. Mutating calls take the caller's last
/// confirmed version as a precondition.
///
/// # Implementation Notes
///
/// Implementations must report a precondition failure as
/// [`DrafterError::VersionConflict`](crate::error::DrafterError::VersionConflict)
/// (or a `Server` error that [`is_version_conflict`](crate::error::DrafterError::is_version_conflict)
/// recognizes) so callers can route it to conflict recovery.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Creates a new session and returns it with its first version.
    async fn create(
        &self,
        name: &str,
        payload: SessionPayload,
        schema_version: u32,
    ) -> Result<WritingSession>;

    /// Fetches a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(session)`: Session found
    /// - `Err(DrafterError::NotFound)`: No session with that ID
    async fn get(&self, session_id: &str) -> Result<WritingSession>;

    /// Applies a partial update if the server still holds `expected_version`.
    ///
    /// # Returns
    ///
    /// - `Ok(session)`: The session as stored after the write, with a new version
    /// - `Err(_)`: Conflict, transport or server failure
    async fn update(
        &self,
        session_id: &str,
        patch: SessionPatch,
        expected_version: u64,
    ) -> Result<WritingSession>;

    /// Deletes a session if the server still holds `expected_version`.
    async fn delete(&self, session_id: &str, expected_version: u64) -> Result<()>;

    /// Lists the most recently updated sessions, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<WritingSession>>;
}
