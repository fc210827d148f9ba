//! Writing session domain model.
//!
//! A writing session is the server-held record of a draft: the prompt
//! buffer, its sampling settings and the names of the template and theme it
//! renders with. The server assigns `version` and bumps it on every write.

use super::settings::GenerationSettings;
use serde::{Deserialize, Serialize};

/// Schema version written by this build of Drafter.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// The opaque payload stored with a writing session.
///
/// Templates and themes are referenced by name only, so edits to a template
/// apply to every session that names it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// The draft text.
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub theme_name: Option<String>,
    /// Whether the prompt is split into role messages before generation.
    #[serde(default)]
    pub chat_mode: bool,
}

impl SessionPayload {
    /// Creates a payload holding only a prompt, with default settings.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// A writing session as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingSession {
    pub id: String,
    pub name: String,
    /// Server-assigned, monotonically increasing write counter.
    pub version: u64,
    pub schema_version: u32,
    pub payload: SessionPayload,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
}

/// Partial update for a writing session. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<SessionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

impl SessionPatch {
    /// A patch that replaces the payload and stamps the current schema version.
    pub fn payload(payload: SessionPayload) -> Self {
        Self {
            payload: Some(payload),
            schema_version: Some(CURRENT_SCHEMA_VERSION),
            ..Default::default()
        }
    }

    /// A patch that only renames the session.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Applies the patch to a session in place.
    pub fn apply_to(self, session: &mut WritingSession) {
        if let Some(name) = self.name {
            session.name = name;
        }
        if let Some(payload) = self.payload {
            session.payload = payload;
        }
        if let Some(schema_version) = self.schema_version {
            session.schema_version = schema_version;
        }
    }
}

/// The subset of a session compared by the dirty check.
///
/// Held by the save scheduler as the last state the server confirmed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedSnapshot {
    pub prompt: String,
    pub settings: GenerationSettings,
    pub template_name: Option<String>,
    pub theme_name: Option<String>,
    pub chat_mode: bool,
}

impl SavedSnapshot {
    /// Returns true when `payload` differs from this snapshot in any tracked field.
    pub fn differs_from(&self, payload: &SessionPayload) -> bool {
        self.prompt != payload.prompt
            || self.settings != payload.settings
            || self.template_name != payload.template_name
            || self.theme_name != payload.theme_name
            || self.chat_mode != payload.chat_mode
    }
}

impl From<&SessionPayload> for SavedSnapshot {
    fn from(payload: &SessionPayload) -> Self {
        Self {
            prompt: payload.prompt.clone(),
            settings: payload.settings.clone(),
            template_name: payload.template_name.clone(),
            theme_name: payload.theme_name.clone(),
            chat_mode: payload.chat_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_every_field() {
        let base = SessionPayload::with_prompt("Once upon a time");
        let snapshot = SavedSnapshot::from(&base);
        assert!(!snapshot.differs_from(&base));

        let mut edited = base.clone();
        edited.chat_mode = true;
        assert!(snapshot.differs_from(&edited));

        let mut edited = base.clone();
        edited.theme_name = Some("sepia".into());
        assert!(snapshot.differs_from(&edited));

        let mut edited = base.clone();
        edited.settings.stop.push("END".into());
        assert!(snapshot.differs_from(&edited));
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut session = WritingSession {
            id: "s1".into(),
            name: "Draft".into(),
            version: 4,
            schema_version: 0,
            payload: SessionPayload::with_prompt("a"),
            created_at: String::new(),
            updated_at: String::new(),
        };
        SessionPatch::rename("Chapter 1").apply_to(&mut session);
        assert_eq!(session.name, "Chapter 1");
        assert_eq!(session.payload.prompt, "a");
        assert_eq!(session.schema_version, 0);

        SessionPatch::payload(SessionPayload::with_prompt("b")).apply_to(&mut session);
        assert_eq!(session.payload.prompt, "b");
        assert_eq!(session.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_payload_wire_format_is_camel_case() {
        let payload: SessionPayload = serde_json::from_str(
            r#"{"prompt":"hi","templateName":"chatml","chatMode":true}"#,
        )
        .unwrap();
        assert_eq!(payload.template_name.as_deref(), Some("chatml"));
        assert!(payload.chat_mode);
        assert_eq!(payload.theme_name, None);
    }
}
