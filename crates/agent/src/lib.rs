//! Interview agent
//!
//! Features:
//! - Stage machine driving the interview from greeting to recommendation
//! - Model-backed answer extraction with fail-closed validation
//! - Domain knowledge store with add-if-absent registration
//! - Summary and tech stack recommendation hand-off
//! - Bounded exponential backoff for model calls

pub mod domain_knowledge;
pub mod extractor;
pub mod messages;
pub mod prompts;
pub mod recommendation;
pub mod retry;
pub mod stage;

pub use domain_knowledge::{DomainKnowledge, DomainKnowledgeStore, DomainRegistration};
pub use extractor::{Classification, ExtractionContext, ResponseExtractor};
pub use recommendation::{RecommendationAgent, StackRecommender};
pub use retry::{with_backoff, RetryPolicy};
pub use stage::{
    StageMachine, StageTransition, TransitionReason, TurnContext, TurnOutcome, TurnResult,
};

use stack_advisor_llm::LlmError;
use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Empty message for stage {0}")]
    EmptyMessage(&'static str),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Domain knowledge error: {0}")]
    DomainStore(String),
}
