//! Conversation persistence for the stack advisor
//!
//! Provides:
//! - Session documents with optimistic version checks
//! - Append-only conversation transcripts
//! - ScyllaDB and in-memory implementations of `ConversationStore`

pub mod client;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sessions;
pub mod store;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use memory::InMemoryConversationStore;
pub use sessions::ScyllaConversationStore;
pub use store::{collapse_repeated_turns, ConversationStore, MonotonicClock};

/// Connect to ScyllaDB, ensure the schema and build the conversation store
pub async fn init(config: ScyllaConfig) -> Result<ScyllaConversationStore, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;
    Ok(ScyllaConversationStore::new(client))
}
