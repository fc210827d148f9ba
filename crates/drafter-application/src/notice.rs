//! User-visible notices.
//!
//! Components never talk to the UI directly; they publish [`Notice`]s on a
//! channel the UI drains and renders as dismissible notifications.

use serde::Serialize;
use tokio::sync::mpsc;

/// The kind of server resource a conflict was reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Session,
    Template,
    Theme,
}

/// Actions a notice offers besides dismissal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeAction {
    /// Replace the local copy with the server's.
    ReloadFromServer,
    /// Keep local edits and overwrite the server copy on the next save.
    KeepLocal,
}

/// How urgently assistive technology should announce a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Politeness {
    Polite,
    Assertive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// A write was rejected because the server holds a newer version.
    Conflict {
        resource: ResourceKind,
        id: String,
        message: String,
        server_version: Option<u64>,
    },
    /// A save failed for a transient reason and stays queued.
    SaveFailed { session_id: String, message: String },
    /// Generation failed before or while streaming.
    GenerationFailed { session_id: String, message: String },
    /// A fill prompt used the generic instruction because the template has
    /// no usable FIM format. Sent once per template.
    FimFallback { template: Option<String> },
    /// The message extractor skipped text outside any template turn.
    TextDiscarded { session_id: String, spans: Vec<String> },
}

impl Notice {
    /// Text suitable for the notification body and screen readers.
    pub fn message(&self) -> String {
        match self {
            Notice::Conflict {
                resource, message, ..
            } => format!(
                "This {} was changed elsewhere. Your edits are kept locally; reload from the server to continue saving. ({})",
                resource_label(*resource),
                message
            ),
            Notice::SaveFailed { message, .. } => {
                format!("Saving failed, will retry on the next edit: {message}")
            }
            Notice::GenerationFailed { message, .. } => format!("Generation failed: {message}"),
            Notice::FimFallback { template } => match template {
                Some(name) => format!(
                    "Template '{name}' has no fill-in-the-middle format; using a generic fill prompt."
                ),
                None => "No template selected; using a generic fill prompt.".to_string(),
            },
            Notice::TextDiscarded { spans, .. } => format!(
                "{} span(s) of text outside any template turn were not sent to the model.",
                spans.len()
            ),
        }
    }

    /// Actions offered besides dismissal.
    pub fn actions(&self) -> &'static [NoticeAction] {
        match self {
            Notice::Conflict {
                resource: ResourceKind::Session,
                ..
            } => &[NoticeAction::ReloadFromServer, NoticeAction::KeepLocal],
            Notice::Conflict { .. } => &[NoticeAction::ReloadFromServer],
            _ => &[],
        }
    }

    pub fn politeness(&self) -> Politeness {
        match self {
            Notice::Conflict { .. } | Notice::SaveFailed { .. } | Notice::GenerationFailed { .. } => {
                Politeness::Assertive
            }
            Notice::FimFallback { .. } | Notice::TextDiscarded { .. } => Politeness::Polite,
        }
    }
}

fn resource_label(resource: ResourceKind) -> &'static str {
    match resource {
        ResourceKind::Session => "session",
        ResourceKind::Template => "template",
        ResourceKind::Theme => "theme",
    }
}

/// Sending half of the notice channel.
///
/// Sending never fails from the caller's point of view: if the UI dropped
/// its receiver the notice is only logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    /// Creates a notifier and the receiver the UI drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn notify(&self, notice: Notice) {
        tracing::info!("[Notifier] {}", notice.message());
        let _ = self.sender.send(notice);
    }
}
