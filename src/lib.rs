//! Atticus: orchestration engine for a legal research assistant.
//!
//! The crate turns operator intent (typed questions, attached files, voice
//! dictation, read-aloud requests, per-document actions) into well-ordered
//! calls to a Gemini-style completion service and merges the results into
//! durable local state.
//!
//! # Architecture
//!
//! Independent components share one gateway and one store:
//! - **Session coordinator**: transcript, turn state machine, saved history
//! - **Document vault**: managed files, per-document actions, task lists
//! - **Citation normalizer**: grounding-chunk dedup and verification tagging
//! - **Audio pipeline**: PCM16 decode and the exclusive playback slot
//! - **Dictation**: speech-to-text toggle feeding the draft field
//! - **Gateway**: typed `generateContent` adapter over `reqwest`
//!
//! [`engine::Engine::start`] wires everything together from an
//! [`config::AppConfig`] plus the two host capabilities (audio output,
//! speech recognition).

pub mod app_dirs;
pub mod audio;
pub mod citations;
pub mod config;
pub mod credentials;
pub mod dictation;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod persona;
pub mod session;
pub mod store;
pub mod vault;

mod ids;

pub use audio::{AudioSink, PcmBuffer, PlaybackController, PlaybackOutcome};
pub use citations::Citation;
pub use config::AppConfig;
pub use credentials::CredentialRef;
pub use dictation::{DictationController, SpeechRecognizer};
pub use engine::{ConfiguredChanged, Engine};
pub use error::{AtticusError, Result};
pub use gateway::{CompletionGateway, CompletionRequest, CompletionResponse, GeminiGateway};
pub use session::{AttachmentInput, Message, SessionCoordinator, TurnOutcome, TurnPhase};
pub use vault::{ActionOutcome, Document, DocumentVault, FileInput, Task};
