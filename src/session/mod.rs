//! Conversation state: transcript types and the turn coordinator.

pub mod coordinator;
pub mod types;

pub use coordinator::SessionCoordinator;
pub use types::{
    AttachmentInput, AttachmentRef, AttachmentStatus, Message, Role, SessionRecord, TurnOutcome,
    TurnPhase,
};
