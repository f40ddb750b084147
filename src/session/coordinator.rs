//! Turn lifecycle, transcript state, and session history.
//!
//! One lock covers the active conversation and the stored session list.
//! The lock is never held across the gateway call; the `Pending` phase is
//! what keeps a second turn out while the first is in flight.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use crate::citations::{Citation, normalize_citations, verified_only};
use crate::dictation::DictationController;
use crate::error::{AtticusError, Result};
use crate::gateway::{CompletionGateway, CompletionRequest, CompletionResponse};
use crate::ids::new_id;
use crate::persona::chat_persona;
use crate::store::StateStore;

use super::types::{
    AttachmentInput, AttachmentRef, AttachmentStatus, Message, SessionRecord, TurnOutcome,
    TurnPhase, derive_title,
};

struct CoordinatorState {
    /// Stored session backing the active conversation, if one exists yet.
    session_id: Option<String>,
    messages: Vec<Message>,
    citations: Vec<Citation>,
    phase: TurnPhase,
    sessions: Vec<SessionRecord>,
}

impl CoordinatorState {
    fn new() -> Self {
        Self {
            session_id: None,
            messages: Vec::new(),
            citations: Vec::new(),
            phase: TurnPhase::Idle,
            sessions: Vec::new(),
        }
    }

    fn reset_active(&mut self) {
        self.session_id = None;
        self.messages.clear();
        self.citations.clear();
        self.phase = TurnPhase::Idle;
    }
}

/// Drives the conversation: validates submissions, dispatches gateway
/// calls, merges responses, and snapshots completed turns into history.
pub struct SessionCoordinator {
    gateway: Arc<dyn CompletionGateway>,
    store: Arc<dyn StateStore>,
    dictation: Arc<DictationController>,
    state: Mutex<CoordinatorState>,
}

impl SessionCoordinator {
    /// Create a coordinator with an empty conversation and no history.
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        store: Arc<dyn StateStore>,
        dictation: Arc<DictationController>,
    ) -> Self {
        Self {
            gateway,
            store,
            dictation,
            state: Mutex::new(CoordinatorState::new()),
        }
    }

    /// Replace the stored session list with the persisted record.
    pub async fn load(&self) -> Result<()> {
        let loaded = self.store.load_history().await?;
        let Ok(mut state) = self.state.lock() else {
            return Err(lock_poisoned());
        };
        state.sessions = loaded;
        Ok(())
    }

    // ── Turn lifecycle ───────────────────────────────────────────────────────

    /// Run one conversation turn.
    ///
    /// While a turn is pending, further submissions return
    /// [`TurnOutcome::Ignored`] without reaching the gateway. Gateway
    /// failures are converted into a diagnostic assistant message and
    /// reported as [`TurnOutcome::Failed`], never as an `Err`.
    pub async fn submit_turn(
        &self,
        text: &str,
        attachment: Option<AttachmentInput>,
    ) -> Result<TurnOutcome> {
        let text = text.trim();

        // Gate, validate, and claim Pending in one lock hold.
        let (message_id, request) = {
            let Ok(mut state) = self.state.lock() else {
                return Err(lock_poisoned());
            };
            if !state.phase.accepts_submission() {
                debug!("turn already pending; submission ignored");
                return Ok(TurnOutcome::Ignored);
            }
            if text.is_empty() && attachment.is_none() {
                return Err(AtticusError::InvalidInput(
                    "a turn needs text or an attached file".to_owned(),
                ));
            }
            if !self.gateway.is_configured() {
                return Err(AtticusError::NotConfigured);
            }

            let is_image = attachment
                .as_ref()
                .is_some_and(|file| file.media_type.starts_with("image/"));
            let attachment_ref = attachment.as_ref().map(|file| AttachmentRef {
                name: file.name.clone(),
                reference: format!("mem://{}", new_id("att")),
                media_type: file.media_type.clone(),
                status: AttachmentStatus::Analyzing,
            });

            let message = Message::operator(text, attachment_ref);
            let message_id = message.id.clone();
            state.messages.push(message);
            state.phase = TurnPhase::Pending;

            let mut request =
                CompletionRequest::chat(chat_persona(is_image)).with_grounded_search(!is_image);
            if !text.is_empty() {
                request = request.with_text(text);
            }
            if let Some(file) = &attachment {
                request = request.with_inline(file.media_type.clone(), file.data.clone());
            }
            (message_id, request)
        };

        // Dictation may not run past submission.
        self.dictation.finish();

        match self.gateway.complete(request).await {
            Ok(response) => {
                self.merge_success(&message_id, response).await?;
                Ok(TurnOutcome::Completed)
            }
            Err(e) => {
                warn!(error = %e, "turn failed");
                self.merge_failure(&message_id, &e)?;
                Ok(TurnOutcome::Failed)
            }
        }
    }

    /// Merge a successful response and snapshot the conversation to history.
    async fn merge_success(
        &self,
        operator_message_id: &str,
        response: CompletionResponse,
    ) -> Result<()> {
        let snapshot = {
            let Ok(mut guard) = self.state.lock() else {
                return Err(lock_poisoned());
            };
            let state = &mut *guard;

            set_attachment_status(
                &mut state.messages,
                operator_message_id,
                AttachmentStatus::Ready,
            );
            state.messages.push(Message::assistant(response.text));
            // The latest turn's citations are authoritative; no union with
            // the previous set.
            state.citations = normalize_citations(&response.grounding);
            state.phase = TurnPhase::Resolved;

            let session_id = match &state.session_id {
                Some(id) => id.clone(),
                None => {
                    let id = new_id("ses");
                    state.session_id = Some(id.clone());
                    id
                }
            };
            if let Some(record) = state.sessions.iter_mut().find(|s| s.id == session_id) {
                record.messages = state.messages.clone();
                record.citations = state.citations.clone();
            } else {
                state.sessions.push(SessionRecord {
                    id: session_id,
                    title: derive_title(&state.messages),
                    created_at: Utc::now(),
                    messages: state.messages.clone(),
                    citations: state.citations.clone(),
                });
            }
            state.sessions.clone()
        };

        self.store.save_history(&snapshot).await
    }

    /// Record a failed turn in the transcript only; history is untouched.
    fn merge_failure(&self, operator_message_id: &str, error: &AtticusError) -> Result<()> {
        let Ok(mut state) = self.state.lock() else {
            return Err(lock_poisoned());
        };
        set_attachment_status(
            &mut state.messages,
            operator_message_id,
            AttachmentStatus::Failed,
        );
        state.messages.push(Message::assistant(diagnostic_for(error)));
        state.phase = TurnPhase::Failed;
        Ok(())
    }

    // ── Session management ───────────────────────────────────────────────────

    /// Clear the active conversation. Stored sessions are untouched.
    pub fn start_new_session(&self) -> Result<()> {
        let Ok(mut state) = self.state.lock() else {
            return Err(lock_poisoned());
        };
        state.reset_active();
        Ok(())
    }

    /// Make a stored session the active conversation.
    ///
    /// The stored record itself is not mutated; the active arrays hold
    /// copies until the next successful turn writes them back.
    pub fn load_session(&self, session_id: &str) -> Result<()> {
        let Ok(mut guard) = self.state.lock() else {
            return Err(lock_poisoned());
        };
        let state = &mut *guard;
        let Some(record) = state.sessions.iter().find(|s| s.id == session_id) else {
            return Err(AtticusError::InvalidInput(format!(
                "unknown session: {session_id}"
            )));
        };
        state.messages = record.messages.clone();
        state.citations = record.citations.clone();
        state.session_id = Some(record.id.clone());
        state.phase = TurnPhase::Idle;
        Ok(())
    }

    /// Delete a stored session. Deleting the active one also clears the
    /// active conversation. Returns whether a record was removed.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let (removed, snapshot) = {
            let Ok(mut state) = self.state.lock() else {
                return Err(lock_poisoned());
            };
            let before = state.sessions.len();
            state.sessions.retain(|s| s.id != session_id);
            let removed = state.sessions.len() != before;
            if state.session_id.as_deref() == Some(session_id) {
                state.reset_active();
            }
            (removed, state.sessions.clone())
        };

        if removed {
            self.store.save_history(&snapshot).await?;
        }
        Ok(removed)
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    /// Transcript of the active conversation.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        match self.state.lock() {
            Ok(state) => state.messages.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Full citation set from the last resolved turn.
    #[must_use]
    pub fn citations(&self) -> Vec<Citation> {
        match self.state.lock() {
            Ok(state) => state.citations.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Citations with a resolvable source, the default rail view.
    #[must_use]
    pub fn verified_citations(&self) -> Vec<Citation> {
        verified_only(&self.citations())
    }

    /// Current turn phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        match self.state.lock() {
            Ok(state) => state.phase,
            Err(_) => TurnPhase::Idle,
        }
    }

    /// Identifier of the stored session backing the active conversation.
    #[must_use]
    pub fn active_session_id(&self) -> Option<String> {
        match self.state.lock() {
            Ok(state) => state.session_id.clone(),
            Err(_) => None,
        }
    }

    /// All stored sessions, newest last.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionRecord> {
        match self.state.lock() {
            Ok(state) => state.sessions.clone(),
            Err(_) => Vec::new(),
        }
    }
}

fn lock_poisoned() -> AtticusError {
    AtticusError::Storage("conversation state lock poisoned".to_owned())
}

fn set_attachment_status(messages: &mut [Message], message_id: &str, status: AttachmentStatus) {
    if let Some(attachment) = messages
        .iter_mut()
        .find(|m| m.id == message_id)
        .and_then(|m| m.attachment.as_mut())
    {
        attachment.status = status;
    }
}

/// User-facing text for a failed turn, one string per error bucket.
fn diagnostic_for(error: &AtticusError) -> String {
    match error {
        AtticusError::NotConfigured => "I can't reach the research service because no API \
            credential is configured. Add a credential in settings and try again."
            .to_owned(),
        other => format!("I ran into a problem answering that ({other}). Please try again."),
    }
}
