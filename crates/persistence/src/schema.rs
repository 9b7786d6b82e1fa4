//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // One row per conversation; `version` backs the compare-and-swap on save
    let sessions_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.conversation_sessions (
            session_id TEXT,
            user_id TEXT,
            stage TEXT,
            state TEXT,
            version BIGINT,
            updated_at TIMESTAMP,
            PRIMARY KEY (session_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(sessions_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::SchemaError(format!(
                "Failed to create conversation_sessions table: {}",
                e
            ))
        })?;

    // Append-only transcript, newest first within a session
    let transcript_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.conversation_transcript (
            session_id TEXT,
            created_at TIMESTAMP,
            entry_id UUID,
            role TEXT,
            content TEXT,
            user_id TEXT,
            PRIMARY KEY ((session_id), created_at, entry_id)
        ) WITH CLUSTERING ORDER BY (created_at DESC, entry_id ASC)
    "#,
        keyspace
    );

    session
        .query_unpaged(transcript_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::SchemaError(format!(
                "Failed to create conversation_transcript table: {}",
                e
            ))
        })?;

    tracing::info!("All tables created successfully");
    Ok(())
}
