//! Error types for the Atticus engine.

/// Top-level error type for the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum AtticusError {
    /// No gateway credential is available; request issuance is blocked.
    #[error("gateway is not configured: no API credential available")]
    NotConfigured,

    /// A completion-service call failed (transport or service error).
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// A document action was attempted without its in-memory payload.
    #[error("document payload unavailable: {0}")]
    PayloadUnavailable(String),

    /// Empty or otherwise unusable operator input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Audio decode or playback error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Durable state store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration or credential resolution error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AtticusError>;
