//! Error types for Drafter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Drafter workspace.
///
/// Variants map onto the recovery policy of the caller: conflicts and
/// malformed templates are recovered locally, network and server errors are
/// surfaced and retried on the next natural trigger, validation errors never
/// reach the network layer.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrafterError {
    /// Optimistic-concurrency precondition failed.
    #[error("Version conflict on {resource} '{id}': expected version {expected}{}", .actual.map(|v| format!(", server has {v}")).unwrap_or_default())]
    VersionConflict {
        resource: &'static str,
        id: String,
        expected: u64,
        actual: Option<u64>,
    },

    /// Transport-level failure (connection refused, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success response from the server.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Input rejected before dispatch.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generation stream was cancelled by the user or the system.
    #[error("Generation stream aborted")]
    StreamAborted,

    /// Template cannot be used for the requested prompt shape.
    #[error("Template '{name}' is malformed: {reason}")]
    TemplateMalformed { name: String, reason: String },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrafterError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a VersionConflict error
    pub fn conflict(
        resource: &'static str,
        id: impl Into<String>,
        expected: u64,
        actual: Option<u64>,
    ) -> Self {
        Self::VersionConflict {
            resource,
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a Server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a TemplateMalformed error
    pub fn template_malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateMalformed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this error reports a failed version precondition.
    ///
    /// Returns true for:
    /// - `VersionConflict` errors
    /// - `Server` errors with status 409
    /// - `Server` errors whose message mentions an expected version
    pub fn is_version_conflict(&self) -> bool {
        match self {
            Self::VersionConflict { .. } => true,
            Self::Server { status, message } => {
                *status == 409 || message.to_lowercase().contains("expected version")
            }
            _ => false,
        }
    }

    /// Check if this is a transient network or server error
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Server { .. } => !self.is_version_conflict(),
            _ => false,
        }
    }

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error represents a cancelled generation stream
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::StreamAborted)
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for DrafterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for DrafterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DrafterError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for DrafterError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error for collaborators that report untyped errors
impl From<anyhow::Error> for DrafterError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, DrafterError>`.
pub type Result<T> = std::result::Result<T, DrafterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_detection() {
        assert!(DrafterError::conflict("WritingSession", "s1", 3, Some(4)).is_version_conflict());
        assert!(DrafterError::server(409, "precondition failed").is_version_conflict());
        assert!(
            DrafterError::server(400, "Expected version 3 but found 5").is_version_conflict()
        );
        assert!(!DrafterError::server(500, "boom").is_version_conflict());
        assert!(!DrafterError::network("refused").is_version_conflict());
    }

    #[test]
    fn test_transient_classification() {
        assert!(DrafterError::network("timeout").is_transient());
        assert!(DrafterError::server(503, "unavailable").is_transient());
        assert!(!DrafterError::server(409, "conflict").is_transient());
        assert!(!DrafterError::validation("empty name").is_transient());
    }

    #[test]
    fn test_conflict_message_includes_versions() {
        let err = DrafterError::conflict("WritingSession", "abc", 2, Some(5));
        assert_eq!(
            err.to_string(),
            "Version conflict on WritingSession 'abc': expected version 2, server has 5"
        );
        let err = DrafterError::conflict("Template", "chatml", 1, None);
        assert_eq!(
            err.to_string(),
            "Version conflict on Template 'chatml': expected version 1"
        );
    }
}
