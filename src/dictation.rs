//! Voice dictation: a two-state toggle that drafts operator text.
//!
//! Dictation never submits anything. While listening, recognized segments
//! accumulate into a draft the composer displays; ending dictation (operator
//! toggle, recognizer end-of-speech, or a turn submission) keeps the last
//! draft in place. Speech recognition itself lives behind the
//! [`SpeechRecognizer`] capability, implemented by the host shell.

use std::sync::Mutex;

use tracing::debug;

use crate::error::Result;

/// Speech recognition capability implemented by the host shell.
///
/// `start` may fail (no microphone, no permission); `stop` is idempotent
/// and safe to call when recognition is not running.
pub trait SpeechRecognizer: Send + Sync {
    /// Begin capturing and recognizing operator speech.
    ///
    /// # Errors
    ///
    /// Implementations report capture setup failures.
    fn start(&self) -> Result<()>;

    /// Stop capturing.
    fn stop(&self);
}

#[derive(Debug, Default)]
struct DictationState {
    listening: bool,
    draft: String,
}

/// Owns the dictation toggle and the accumulated draft.
pub struct DictationController {
    recognizer: std::sync::Arc<dyn SpeechRecognizer>,
    state: Mutex<DictationState>,
}

impl DictationController {
    /// Create a controller over the given recognizer.
    pub fn new(recognizer: std::sync::Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            state: Mutex::new(DictationState::default()),
        }
    }

    /// Toggle dictation. Returns whether the controller is listening now.
    ///
    /// # Errors
    ///
    /// Propagates recognizer start failures; the controller stays idle.
    pub fn toggle(&self) -> Result<bool> {
        if self.is_listening() {
            self.finish();
            Ok(false)
        } else {
            self.begin()?;
            Ok(true)
        }
    }

    /// Begin dictation, clearing any previous draft.
    ///
    /// No-op while already listening.
    ///
    /// # Errors
    ///
    /// Propagates recognizer start failures; the controller stays idle.
    pub fn begin(&self) -> Result<()> {
        {
            let Ok(state) = self.state.lock() else {
                return Ok(());
            };
            if state.listening {
                return Ok(());
            }
        }

        self.recognizer.start()?;

        if let Ok(mut state) = self.state.lock() {
            state.listening = true;
            state.draft.clear();
        }
        debug!("dictation started");
        Ok(())
    }

    /// End dictation, keeping the accumulated draft.
    pub fn finish(&self) {
        let was_listening = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let was = state.listening;
            state.listening = false;
            was
        };
        if was_listening {
            self.recognizer.stop();
            debug!("dictation finished");
        }
    }

    /// Recognizer-side end of speech (silence detected). Same as [`finish`].
    ///
    /// [`finish`]: DictationController::finish
    pub fn end_of_speech(&self) {
        self.finish();
    }

    /// Append a recognized segment to the draft.
    ///
    /// Segments arriving after dictation ended are dropped.
    pub fn push_transcript(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Ok(mut state) = self.state.lock()
            && state.listening
        {
            if !state.draft.is_empty() {
                state.draft.push(' ');
            }
            state.draft.push_str(text);
        }
    }

    /// The current draft text.
    #[must_use]
    pub fn draft(&self) -> String {
        self.state
            .lock()
            .map(|state| state.draft.clone())
            .unwrap_or_default()
    }

    /// Whether dictation is active.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state.lock().map(|state| state.listening).unwrap_or(false)
    }
}
