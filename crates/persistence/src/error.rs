//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Another writer saved the session first
    #[error("Version conflict on session {session_id}: expected version {expected}")]
    Conflict { session_id: String, expected: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PersistenceError {
    /// True for lost optimistic-concurrency races; the whole turn may be retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PersistenceError::Conflict { .. })
    }
}

impl From<scylla::transport::errors::NewSessionError> for PersistenceError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        PersistenceError::Connection(err.to_string())
    }
}

impl From<scylla::transport::errors::QueryError> for PersistenceError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        PersistenceError::Query(err.to_string())
    }
}
