//! Transcript entries, session records, and turn lifecycle types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::citations::Citation;
use crate::ids::new_id;

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human operator.
    Operator,
    /// The remote assistant.
    Assistant,
}

/// Lifecycle of a file attached to an operator message.
///
/// Advanced only by the coordinator as the owning turn resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    /// Attached but not yet dispatched.
    Queued,
    /// Sent with a turn that is still pending.
    Analyzing,
    /// The owning turn resolved.
    Ready,
    /// The owning turn failed.
    Failed,
}

/// Descriptor of a file attached to an operator message.
///
/// Carries metadata only; the binary content rides in the turn's gateway
/// request and is never part of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Display name of the attached file.
    pub name: String,
    /// Stable retrievable reference (`mem://` handle).
    pub reference: String,
    /// Media kind, e.g. `image/png` or `application/pdf`.
    pub media_type: String,
    /// Lifecycle status.
    pub status: AttachmentStatus,
}

impl AttachmentRef {
    /// True for image attachments, which switch the turn to the visual
    /// evidence persona with grounding off.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// A file handed to `submit_turn`, before it becomes a transcript attachment.
#[derive(Debug, Clone)]
pub struct AttachmentInput {
    /// Display name.
    pub name: String,
    /// Media kind.
    pub media_type: String,
    /// File content.
    pub data: Bytes,
}

impl AttachmentInput {
    /// Build an input from name, media type, and content.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the session.
    pub id: String,
    /// Author role.
    pub role: Role,
    /// Body text.
    pub text: String,
    /// Attached file descriptor, operator messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// New operator message.
    pub fn operator(text: impl Into<String>, attachment: Option<AttachmentRef>) -> Self {
        Self {
            id: new_id("msg"),
            role: Role::Operator,
            text: text.into(),
            attachment,
            created_at: Utc::now(),
        }
    }

    /// New assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: new_id("msg"),
            role: Role::Assistant,
            text: text.into(),
            attachment: None,
            created_at: Utc::now(),
        }
    }
}

/// A saved conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier, allocated on the first successful turn.
    pub id: String,
    /// Derived display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Full transcript as of the last successful turn.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Citation set as of the last successful turn.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Turn lifecycle for the active conversation.
///
/// `Resolved` and `Failed` are rest states: the only gate is that a new
/// turn may not start while one is `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn has run yet.
    #[default]
    Idle,
    /// A turn is in flight; new submissions are ignored.
    Pending,
    /// The last turn merged successfully.
    Resolved,
    /// The last turn failed; the transcript carries the diagnostic.
    Failed,
}

impl TurnPhase {
    /// Whether a new turn may start.
    #[must_use]
    pub fn accepts_submission(self) -> bool {
        self != Self::Pending
    }
}

/// What `submit_turn` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn resolved and was merged into the session.
    Completed,
    /// The gateway failed; a diagnostic message was appended instead.
    Failed,
    /// A turn was already pending; this submission was dropped.
    Ignored,
}

/// Fallback title for conversations with nothing derivable.
pub const UNTITLED_SESSION: &str = "New conversation";

const TITLE_MAX_CHARS: usize = 40;

/// Derive a session title from the transcript.
///
/// The first operator message decides: its leading characters when it has
/// text, the attached file's name when it does not, the fixed fallback when
/// neither exists.
#[must_use]
pub fn derive_title(messages: &[Message]) -> String {
    let Some(first) = messages.iter().find(|m| m.role == Role::Operator) else {
        return UNTITLED_SESSION.to_owned();
    };

    let text = first.text.trim();
    if !text.is_empty() {
        let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
        if text.chars().count() > TITLE_MAX_CHARS {
            title.push('…');
        }
        return title;
    }

    if let Some(attachment) = &first.attachment {
        return attachment.name.clone();
    }

    UNTITLED_SESSION.to_owned()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn attachment(name: &str, media_type: &str) -> AttachmentRef {
        AttachmentRef {
            name: name.to_owned(),
            reference: "mem://doc-1".to_owned(),
            media_type: media_type.to_owned(),
            status: AttachmentStatus::Queued,
        }
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Role::Operator).unwrap();
        assert_eq!(json, r#""operator""#);
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }

    #[test]
    fn image_detection_uses_media_type_prefix() {
        assert!(attachment("scan.png", "image/png").is_image());
        assert!(!attachment("brief.pdf", "application/pdf").is_image());
    }

    #[test]
    fn message_without_attachment_omits_the_field() {
        let message = Message::assistant("hello");
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("attachment"));
    }

    #[test]
    fn message_ids_are_unique() {
        let a = Message::operator("one", None);
        let b = Message::operator("two", None);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("msg-"));
    }

    #[test]
    fn pending_is_the_only_gating_phase() {
        assert!(TurnPhase::Idle.accepts_submission());
        assert!(TurnPhase::Resolved.accepts_submission());
        assert!(TurnPhase::Failed.accepts_submission());
        assert!(!TurnPhase::Pending.accepts_submission());
    }

    #[test]
    fn title_comes_from_first_operator_message() {
        let messages = vec![
            Message::operator("What is the statute of limitations for fraud?", None),
            Message::assistant("It depends on the jurisdiction."),
        ];
        assert_eq!(
            derive_title(&messages),
            "What is the statute of limitations for f…"
        );
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let text = "a".repeat(60);
        let messages = vec![Message::operator(text, None)];
        let title = derive_title(&messages);
        assert_eq!(title.chars().count(), 41);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn title_falls_back_to_attachment_name() {
        let messages = vec![Message::operator(
            "",
            Some(attachment("lease-agreement.pdf", "application/pdf")),
        )];
        assert_eq!(derive_title(&messages), "lease-agreement.pdf");
    }

    #[test]
    fn title_falls_back_to_constant_without_content() {
        assert_eq!(derive_title(&[]), UNTITLED_SESSION);
        let messages = vec![Message::operator("   ", None)];
        assert_eq!(derive_title(&messages), UNTITLED_SESSION);
    }

    #[test]
    fn session_record_tolerates_missing_arrays() {
        let json = r#"{"id":"ses-1","title":"T","created_at":"2025-06-01T10:00:00Z"}"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert!(record.messages.is_empty());
        assert!(record.citations.is_empty());
    }
}
