//! Completion gateway: the boundary between the engine and the model service.
//!
//! Everything the engine wants from the remote service goes through one
//! request/response pair. A [`CompletionRequest`] names the mode, the persona
//! instruction, the content parts, and whether grounded search is on; a
//! [`CompletionResponse`] carries whatever came back that the mode cares
//! about (text, grounding chunks, synthesized audio). Components never see
//! URLs, wire formats, or transport errors — those stay inside the
//! [`gemini`] adapter.

pub mod gemini;

pub use gemini::GeminiGateway;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// ── Request ────────────────────────────────────────────────────

/// What a completion request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Conversational turn.
    Chat,
    /// Document summary.
    Summarize,
    /// Document analysis against an operator prompt.
    Analyze,
    /// Speech synthesis.
    Speak,
}

/// One piece of request content.
#[derive(Debug, Clone)]
pub enum ContentPart {
    /// Plain text.
    Text(String),
    /// Binary payload sent inline (document bytes, image bytes).
    Inline { media_type: String, data: Bytes },
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Request mode.
    pub kind: RequestKind,
    /// System instruction; empty for speech synthesis.
    pub persona: String,
    /// Content parts in send order.
    pub parts: Vec<ContentPart>,
    /// Whether the grounded search tool is attached.
    pub grounded_search: bool,
}

impl CompletionRequest {
    /// Conversational turn under the given persona.
    pub fn chat(persona: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Chat,
            persona: persona.into(),
            parts: Vec::new(),
            grounded_search: false,
        }
    }

    /// Document summary request.
    pub fn summarize(persona: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Summarize,
            persona: persona.into(),
            parts: Vec::new(),
            grounded_search: false,
        }
    }

    /// Document analysis request.
    pub fn analyze(persona: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Analyze,
            persona: persona.into(),
            parts: Vec::new(),
            grounded_search: false,
        }
    }

    /// Speech synthesis of `text`. No persona; the text is the whole request.
    pub fn speak(text: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Speak,
            persona: String::new(),
            parts: vec![ContentPart::Text(text.into())],
            grounded_search: false,
        }
    }

    /// Append a text part.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Text(text.into()));
        self
    }

    /// Append an inline binary part.
    #[must_use]
    pub fn with_inline(mut self, media_type: impl Into<String>, data: Bytes) -> Self {
        self.parts.push(ContentPart::Inline {
            media_type: media_type.into(),
            data,
        });
        self
    }

    /// Turn the grounded search tool on or off.
    #[must_use]
    pub fn with_grounded_search(mut self, grounded: bool) -> Self {
        self.grounded_search = grounded;
        self
    }
}

// ── Response ───────────────────────────────────────────────────

/// One grounded source reference attached to a completion.
///
/// Raw wire-level shape: either field may be missing. The citation
/// normalizer decides what is presentable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingChunk {
    /// Source URI, when the service resolved one.
    pub uri: Option<String>,
    /// Human-readable source title.
    pub title: Option<String>,
}

/// What came back from a completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Concatenated text of the response parts.
    pub text: String,
    /// Grounding chunks in wire order, undeduplicated.
    pub grounding: Vec<GroundingChunk>,
    /// Raw PCM16 byte payload for speech requests.
    pub audio: Option<Bytes>,
}

// ── Trait ──────────────────────────────────────────────────────

/// Boundary trait implemented by the remote service adapter.
///
/// Test doubles implement this to drive the engine without a network.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// True when a credential is loaded and requests can be attempted.
    fn is_configured(&self) -> bool;

    /// Execute one completion request.
    ///
    /// # Errors
    ///
    /// [`crate::error::AtticusError::NotConfigured`] without a credential;
    /// [`crate::error::AtticusError::RequestFailed`] for any transport or
    /// service failure.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
