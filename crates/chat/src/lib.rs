#![deny(unsafe_code)]

/// Conversation reducer driving one streamed turn at a time.
pub mod conversation;
/// Transcript entities.
pub mod message;
/// Deterministic stream lifecycle boundaries.
pub mod state;

pub use conversation::{Conversation, PendingTurn, SubmitOutcome, SubmitRejected};
pub use message::{Message, MessageId, MessageStatus, Role, Transcript};
pub use state::{StreamState, StreamTransition, StreamTransitionRejection, StreamTransitionResult};
