//! Durable state: document metadata and session history as JSON records.
//!
//! Two records exist, each a flat JSON array rewritten in full on every
//! mutation. Writes are atomic (temp file + fsync + rename) so a crash
//! never leaves a half-written record behind.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AtticusError, Result};
use crate::session::types::SessionRecord;
use crate::vault::{ActionState, Document};

const DOCUMENTS_FILE: &str = "documents.json";
const HISTORY_FILE: &str = "history.json";

/// Load-at-startup, save-on-mutation persistence boundary.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the stored document metadata, empty when nothing was saved yet.
    async fn load_documents(&self) -> Result<Vec<Document>>;

    /// Replace the stored document record with `documents`.
    async fn save_documents(&self, documents: &[Document]) -> Result<()>;

    /// Load the stored session history, empty when nothing was saved yet.
    async fn load_history(&self) -> Result<Vec<SessionRecord>>;

    /// Replace the stored history record with `sessions`.
    async fn save_history(&self, sessions: &[SessionRecord]) -> Result<()>;
}

// ── Filesystem store ─────────────────────────────────────────────────────────

/// Filesystem-backed store keeping `documents.json` and `history.json`
/// under one data directory.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    data_dir: PathBuf,
}

impl JsonStateStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            AtticusError::Storage(format!(
                "failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;
        Ok(Self { data_dir })
    }

    /// The directory holding both records.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn documents_path(&self) -> PathBuf {
        self.data_dir.join(DOCUMENTS_FILE)
    }

    fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    fn read_array<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            AtticusError::Storage(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AtticusError::Storage(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Write the full record to a temp file, fsync, then rename into place.
    fn write_array_atomic<T: Serialize>(&self, path: &Path, records: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(records).map_err(|e| {
            AtticusError::Storage(format!("failed to serialize {}: {e}", path.display()))
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("record.json");
        let tmp_path = self.data_dir.join(format!(".{file_name}.tmp"));
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
            AtticusError::Storage(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Ok(file) = std::fs::File::open(&tmp_path) {
            let _ = file.sync_all();
        }

        std::fs::rename(&tmp_path, path).map_err(|e| {
            AtticusError::Storage(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        self.read_array(&self.documents_path())
    }

    async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        self.write_array_atomic(&self.documents_path(), documents)
    }

    async fn load_history(&self) -> Result<Vec<SessionRecord>> {
        self.read_array(&self.history_path())
    }

    async fn save_history(&self, sessions: &[SessionRecord]) -> Result<()> {
        self.write_array_atomic(&self.history_path(), sessions)
    }
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// Volatile store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    documents: Mutex<Vec<Document>>,
    history: Mutex<Vec<SessionRecord>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        let Ok(documents) = self.documents.lock() else {
            return Err(AtticusError::Storage("document record lock poisoned".to_owned()));
        };
        Ok(documents.clone())
    }

    async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        let Ok(mut stored) = self.documents.lock() else {
            return Err(AtticusError::Storage("document record lock poisoned".to_owned()));
        };
        // Same shape as the durable record: payloads and guards do not
        // survive a save/load cycle.
        *stored = documents
            .iter()
            .map(|d| {
                let mut d = d.clone();
                d.payload = None;
                d.action = ActionState::default();
                d
            })
            .collect();
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<SessionRecord>> {
        let Ok(history) = self.history.lock() else {
            return Err(AtticusError::Storage("history record lock poisoned".to_owned()));
        };
        Ok(history.clone())
    }

    async fn save_history(&self, sessions: &[SessionRecord]) -> Result<()> {
        let Ok(mut stored) = self.history.lock() else {
            return Err(AtticusError::Storage("history record lock poisoned".to_owned()));
        };
        *stored = sessions.to_vec();
        Ok(())
    }
}
