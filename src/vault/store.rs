//! Vault operations: ingest, gateway-backed document actions, and tasks.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{AtticusError, Result};
use crate::gateway::{CompletionGateway, CompletionRequest};
use crate::ids::new_id;
use crate::persona::{DOCUMENT_PERSONA, SUMMARIZE_INSTRUCTION};
use crate::store::StateStore;

use super::{ActionOutcome, ActionState, Document, FileInput, IngestProgress, Task};

/// Content claimed from a document for one gateway action.
struct ClaimedAction {
    payload: Bytes,
    media_type: String,
}

/// Owns the document collection and its task lists.
///
/// The document lock is never held across a gateway call. In-flight actions
/// are visible through each document's guard instead, so actions on
/// different documents overlap freely while a second action on the same
/// document is turned away.
pub struct DocumentVault {
    gateway: Arc<dyn CompletionGateway>,
    store: Arc<dyn StateStore>,
    documents: Mutex<Vec<Document>>,
}

impl DocumentVault {
    /// Create an empty vault.
    pub fn new(gateway: Arc<dyn CompletionGateway>, store: Arc<dyn StateStore>) -> Self {
        Self {
            gateway,
            store,
            documents: Mutex::new(Vec::new()),
        }
    }

    /// Replace in-memory documents with the stored record.
    ///
    /// Loaded documents carry metadata only; payloads and guards reset.
    pub async fn load(&self) -> Result<()> {
        let loaded = self.store.load_documents().await?;
        let Ok(mut documents) = self.documents.lock() else {
            return Err(lock_poisoned());
        };
        *documents = loaded;
        Ok(())
    }

    /// Snapshot of all documents in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        match self.documents.lock() {
            Ok(documents) => documents.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Snapshot of one document.
    #[must_use]
    pub fn document(&self, document_id: &str) -> Option<Document> {
        let Ok(documents) = self.documents.lock() else {
            return None;
        };
        documents.iter().find(|d| d.id == document_id).cloned()
    }

    // ── Ingest ───────────────────────────────────────────────────────────────

    /// Add a batch of files to the vault.
    ///
    /// Documents appear one at a time and each is persisted as it lands, so
    /// `on_progress` reports a count that only ever goes up and a crash
    /// mid-batch keeps what was already ingested.
    pub async fn ingest<F>(&self, files: Vec<FileInput>, mut on_progress: F) -> Result<Vec<Document>>
    where
        F: FnMut(IngestProgress) + Send,
    {
        let total = files.len();
        let mut created = Vec::with_capacity(total);

        for (index, file) in files.into_iter().enumerate() {
            let document = Document::new(file.name, file.media_type, file.data);
            debug!(document = %document.id, name = %document.name, "ingesting file");
            {
                let Ok(mut documents) = self.documents.lock() else {
                    return Err(lock_poisoned());
                };
                documents.push(document.clone());
            }
            self.persist().await?;
            created.push(document);
            on_progress(IngestProgress {
                done: index + 1,
                total,
            });
        }

        Ok(created)
    }

    /// Remove a document and everything it owns. Returns whether it existed.
    pub async fn remove_document(&self, document_id: &str) -> Result<bool> {
        let removed = {
            let Ok(mut documents) = self.documents.lock() else {
                return Err(lock_poisoned());
            };
            let before = documents.len();
            documents.retain(|d| d.id != document_id);
            documents.len() != before
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Re-supply a document's binary content after a restart.
    ///
    /// Payloads are never persisted, so nothing is written here.
    pub fn restore_payload(&self, document_id: &str, data: Bytes) -> Result<()> {
        let Ok(mut documents) = self.documents.lock() else {
            return Err(lock_poisoned());
        };
        let Some(document) = documents.iter_mut().find(|d| d.id == document_id) else {
            return Err(unknown_document(document_id));
        };
        document.payload = Some(data);
        Ok(())
    }

    // ── Gateway actions ──────────────────────────────────────────────────────

    /// Produce a summary of the document and store it on the record.
    ///
    /// Gateway failures land as a placeholder string in the summary slot;
    /// the operator retries explicitly.
    pub async fn summarize(&self, document_id: &str) -> Result<ActionOutcome> {
        if !self.gateway.is_configured() {
            return Err(AtticusError::NotConfigured);
        }
        let Some(claim) = self.claim_action(document_id, ActionState::Summarizing)? else {
            return Ok(ActionOutcome::Busy);
        };

        let request = CompletionRequest::summarize(DOCUMENT_PERSONA)
            .with_text(SUMMARIZE_INSTRUCTION)
            .with_inline(claim.media_type, claim.payload);

        let outcome = match self.gateway.complete(request).await {
            Ok(response) => {
                self.release_action(document_id, |doc| doc.summary = Some(response.text))?;
                ActionOutcome::Completed
            }
            Err(e) => {
                warn!(document = document_id, error = %e, "summarize failed");
                let placeholder = format!("Could not summarize this document: {e}. Try again.");
                self.release_action(document_id, |doc| doc.summary = Some(placeholder))?;
                ActionOutcome::Failed
            }
        };

        self.persist().await?;
        Ok(outcome)
    }

    /// Analyze the document against an operator-supplied prompt.
    pub async fn analyze(&self, document_id: &str, prompt: &str) -> Result<ActionOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AtticusError::InvalidInput(
                "analysis prompt is empty".to_owned(),
            ));
        }
        if !self.gateway.is_configured() {
            return Err(AtticusError::NotConfigured);
        }
        let Some(claim) = self.claim_action(document_id, ActionState::Analyzing)? else {
            return Ok(ActionOutcome::Busy);
        };

        let request = CompletionRequest::analyze(DOCUMENT_PERSONA)
            .with_text(prompt)
            .with_inline(claim.media_type, claim.payload);

        let outcome = match self.gateway.complete(request).await {
            Ok(response) => {
                self.release_action(document_id, |doc| doc.analysis = Some(response.text))?;
                ActionOutcome::Completed
            }
            Err(e) => {
                warn!(document = document_id, error = %e, "analyze failed");
                let placeholder = format!("Could not analyze this document: {e}. Try again.");
                self.release_action(document_id, |doc| doc.analysis = Some(placeholder))?;
                ActionOutcome::Failed
            }
        };

        self.persist().await?;
        Ok(outcome)
    }

    // ── Tasks ────────────────────────────────────────────────────────────────

    /// Add a task to a document. Deadline is free text; blank means none.
    pub async fn add_task(
        &self,
        document_id: &str,
        text: &str,
        deadline: Option<String>,
    ) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AtticusError::InvalidInput("task text is empty".to_owned()));
        }
        let task = Task {
            id: new_id("task"),
            text: text.to_owned(),
            deadline: deadline
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
            done: false,
        };

        {
            let Ok(mut documents) = self.documents.lock() else {
                return Err(lock_poisoned());
            };
            let Some(document) = documents.iter_mut().find(|d| d.id == document_id) else {
                return Err(unknown_document(document_id));
            };
            document.tasks.push(task.clone());
        }

        self.persist().await?;
        Ok(task)
    }

    /// Flip a task's completion flag. Returns the new state.
    pub async fn toggle_task(&self, document_id: &str, task_id: &str) -> Result<bool> {
        let done = {
            let Ok(mut documents) = self.documents.lock() else {
                return Err(lock_poisoned());
            };
            let Some(document) = documents.iter_mut().find(|d| d.id == document_id) else {
                return Err(unknown_document(document_id));
            };
            let Some(task) = document.tasks.iter_mut().find(|t| t.id == task_id) else {
                return Err(AtticusError::InvalidInput(format!(
                    "unknown task: {task_id}"
                )));
            };
            task.done = !task.done;
            task.done
        };

        self.persist().await?;
        Ok(done)
    }

    /// Delete a task. Deleting a task that is already gone is a no-op.
    pub async fn delete_task(&self, document_id: &str, task_id: &str) -> Result<()> {
        {
            let Ok(mut documents) = self.documents.lock() else {
                return Err(lock_poisoned());
            };
            let Some(document) = documents.iter_mut().find(|d| d.id == document_id) else {
                return Err(unknown_document(document_id));
            };
            document.tasks.retain(|t| t.id != task_id);
        }

        self.persist().await?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Validate preconditions and take the document's action guard.
    ///
    /// `Ok(None)` means the guard is already held. Unknown documents and
    /// absent payloads are errors and leave the guard untouched.
    fn claim_action(
        &self,
        document_id: &str,
        action: ActionState,
    ) -> Result<Option<ClaimedAction>> {
        let Ok(mut documents) = self.documents.lock() else {
            return Err(lock_poisoned());
        };
        let Some(document) = documents.iter_mut().find(|d| d.id == document_id) else {
            return Err(unknown_document(document_id));
        };
        let Some(payload) = document.payload.clone() else {
            return Err(AtticusError::PayloadUnavailable(format!(
                "\"{}\" has no content in this session; upload the file again to run this action",
                document.name
            )));
        };
        if document.action.is_busy() {
            return Ok(None);
        }
        document.action = action;
        Ok(Some(ClaimedAction {
            payload,
            media_type: document.media_type.clone(),
        }))
    }

    /// Write an action result and release the guard.
    ///
    /// A document removed while its action was in flight is left alone; the
    /// result is dropped with it.
    fn release_action(&self, document_id: &str, write: impl FnOnce(&mut Document)) -> Result<()> {
        let Ok(mut documents) = self.documents.lock() else {
            return Err(lock_poisoned());
        };
        if let Some(document) = documents.iter_mut().find(|d| d.id == document_id) {
            write(document);
            document.action = ActionState::Idle;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = {
            let Ok(documents) = self.documents.lock() else {
                return Err(lock_poisoned());
            };
            documents.clone()
        };
        self.store.save_documents(&snapshot).await
    }
}

fn lock_poisoned() -> AtticusError {
    AtticusError::Storage("document collection lock poisoned".to_owned())
}

fn unknown_document(document_id: &str) -> AtticusError {
    AtticusError::InvalidInput(format!("unknown document: {document_id}"))
}
