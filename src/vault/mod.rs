//! Managed documents and their task lists.
//!
//! Each document carries an in-memory payload used for gateway actions. The
//! payload never reaches durable storage; after a restart only the metadata
//! survives, and payload-dependent actions stay unavailable until the
//! operator supplies the file again.

mod store;

pub use store::DocumentVault;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::new_id;

// ── Types ────────────────────────────────────────────────────────────────────

/// Single-occupancy guard for a document's gateway actions.
///
/// At most one action runs per document at a time. Guards on different
/// documents are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionState {
    /// No action in flight.
    #[default]
    Idle,
    /// A summarize request holds the guard.
    Summarizing,
    /// An analyze request holds the guard.
    Analyzing,
}

impl ActionState {
    /// Whether either action currently holds the guard.
    #[must_use]
    pub fn is_busy(self) -> bool {
        self != Self::Idle
    }
}

/// What a summarize or analyze request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The result string was written to the document.
    Completed,
    /// The gateway failed; a placeholder string was written instead.
    Failed,
    /// Another action already holds this document's guard; nothing dispatched.
    Busy,
}

/// A to-do item owned by exactly one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within the owning document.
    pub id: String,
    /// Task text.
    pub text: String,
    /// Free-text deadline, not validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Completion flag.
    #[serde(default)]
    pub done: bool,
}

/// An item in the vault.
///
/// `payload` and `action` are runtime-only state and are skipped by serde,
/// so persisted records hold metadata alone and both fields reset on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Vault-wide unique identifier.
    pub id: String,
    /// Display name, usually the uploaded file name.
    pub name: String,
    /// Stable locator for the in-memory content (`mem://` handle).
    pub reference: String,
    /// Media kind, e.g. `application/pdf`.
    pub media_type: String,
    /// Ingestion time.
    pub created_at: DateTime<Utc>,
    /// Tasks in insertion order.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Latest summary, or the failure placeholder from the last attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Latest analysis, or the failure placeholder from the last attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    /// Binary content, present only while this process holds it.
    #[serde(skip)]
    pub payload: Option<Bytes>,
    /// Action guard.
    #[serde(skip)]
    pub action: ActionState,
}

impl Document {
    /// Allocate a document for a freshly ingested file.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, payload: Bytes) -> Self {
        let id = new_id("doc");
        Self {
            reference: format!("mem://{id}"),
            id,
            name: name.into(),
            media_type: media_type.into(),
            created_at: Utc::now(),
            tasks: Vec::new(),
            summary: None,
            analysis: None,
            payload: Some(payload),
            action: ActionState::Idle,
        }
    }

    /// Whether the binary content is available for gateway actions.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

/// A file handed to `ingest` before it becomes a [`Document`].
#[derive(Debug, Clone)]
pub struct FileInput {
    /// Display name.
    pub name: String,
    /// Media kind.
    pub media_type: String,
    /// File content.
    pub data: Bytes,
}

impl FileInput {
    /// Build an input from name, media type, and content.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }
}

/// Batch progress reported while files are ingested.
///
/// `done` only ever increases within one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestProgress {
    /// Files ingested so far.
    pub done: usize,
    /// Batch size.
    pub total: usize,
}

impl IngestProgress {
    /// Completion as a whole percentage, 100 for an empty batch.
    #[must_use]
    pub fn percent(self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.done * 100) / self.total).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn new_documents_reference_their_own_id() {
        let doc = Document::new("brief.pdf", "application/pdf", Bytes::from_static(b"%PDF"));
        assert!(doc.id.starts_with("doc-"));
        assert_eq!(doc.reference, format!("mem://{}", doc.id));
        assert!(doc.has_payload());
        assert!(doc.tasks.is_empty());
        assert_eq!(doc.action, ActionState::Idle);
    }

    #[test]
    fn payload_and_guard_never_serialize() {
        let doc = Document::new("brief.pdf", "application/pdf", Bytes::from_static(b"%PDF"));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("payload"));
        assert!(!json.contains("action"));
    }

    #[test]
    fn loaded_documents_have_no_payload_and_an_idle_guard() {
        let json = r#"{
            "id": "doc-1",
            "name": "brief.pdf",
            "reference": "mem://doc-1",
            "media_type": "application/pdf",
            "created_at": "2025-06-01T10:00:00Z"
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert!(!doc.has_payload());
        assert_eq!(doc.action, ActionState::Idle);
        assert!(doc.tasks.is_empty());
        assert!(doc.summary.is_none());
    }

    #[test]
    fn tasks_tolerate_missing_optional_fields() {
        let task: Task = serde_json::from_str(r#"{"id":"task-1","text":"File motion"}"#).unwrap();
        assert!(task.deadline.is_none());
        assert!(!task.done);
    }

    #[test]
    fn busy_covers_both_actions() {
        assert!(!ActionState::Idle.is_busy());
        assert!(ActionState::Summarizing.is_busy());
        assert!(ActionState::Analyzing.is_busy());
    }

    #[test]
    fn progress_percent_is_bounded() {
        assert_eq!(IngestProgress { done: 0, total: 4 }.percent(), 0);
        assert_eq!(IngestProgress { done: 1, total: 4 }.percent(), 25);
        assert_eq!(IngestProgress { done: 4, total: 4 }.percent(), 100);
        assert_eq!(IngestProgress { done: 0, total: 0 }.percent(), 100);
    }
}
