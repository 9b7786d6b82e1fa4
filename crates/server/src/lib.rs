//! Stack Advisor Server
//!
//! HTTP API for the stack advisor interview: one endpoint per user turn,
//! plus session snapshots, transcript history, health and metrics.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod state;

pub use auth::auth_middleware;
pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler, record_store_conflict, record_turn};
pub use orchestrator::{TurnOrchestrator, TurnReply, TurnStatus};
pub use state::{open_store, AppState};

use stack_advisor_agent::AgentError;
use stack_advisor_persistence::PersistenceError;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        use axum::http::StatusCode;
        match err {
            ServerError::Persistence(ref e) if e.is_conflict() => StatusCode::CONFLICT,
            ServerError::Agent(_) | ServerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
