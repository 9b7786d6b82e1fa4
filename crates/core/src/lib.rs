//! Core types for the stack advisor
//!
//! Shared by every other crate:
//! - Interview stages and transcript entries
//! - The durable `ConversationSession` record and its invariants

pub mod conversation;
pub mod session;

pub use conversation::{ConversationStage, TranscriptEntry, TurnRole};
pub use session::{invariant_violation, ConversationSession, PillarAnswers, PillarResponses};
