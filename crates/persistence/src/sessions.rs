//! Conversation persistence using ScyllaDB
//!
//! Session saves are lightweight transactions: `INSERT ... IF NOT EXISTS` for
//! a never-saved session, `UPDATE ... IF version = ?` afterwards. A write that
//! is not applied means another turn saved first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::frame::response::result::Row;
use scylla::frame::value::CqlTimestamp;
use scylla::QueryResult;
use uuid::Uuid;

use stack_advisor_core::{ConversationSession, TranscriptEntry, TurnRole};

use crate::store::{collapse_repeated_turns, ConversationStore, MonotonicClock};
use crate::{PersistenceError, ScyllaClient};

/// ScyllaDB implementation of the conversation store
pub struct ScyllaConversationStore {
    client: ScyllaClient,
    clock: MonotonicClock,
}

impl ScyllaConversationStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self {
            client,
            clock: MonotonicClock::new(),
        }
    }
}

/// Read the `[applied]` column of a lightweight transaction result
fn lwt_applied(result: QueryResult) -> bool {
    result
        .rows
        .and_then(|rows| rows.into_iter().next())
        .and_then(|row| row.columns.into_iter().next().flatten())
        .and_then(|value| value.as_boolean())
        .unwrap_or(false)
}

fn row_to_entry(session_id: &str, row: Row) -> Result<TranscriptEntry, PersistenceError> {
    let (role, content, created_at): (String, String, CqlTimestamp) = row
        .into_typed()
        .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

    let role = TurnRole::from_str(&role)
        .ok_or_else(|| PersistenceError::InvalidData(format!("unknown role '{}'", role)))?;

    Ok(TranscriptEntry {
        session_id: session_id.to_string(),
        role,
        content,
        created_at: DateTime::from_timestamp_millis(created_at.0).unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl ConversationStore for ScyllaConversationStore {
    async fn load(&self, session_id: &str) -> Result<ConversationSession, PersistenceError> {
        let query = format!(
            "SELECT state, version FROM {}.conversation_sessions WHERE session_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (session_id,))
            .await?;

        let Some(row) = result.rows.and_then(|rows| rows.into_iter().next()) else {
            tracing::debug!(session_id = %session_id, "No stored session, starting fresh");
            return Ok(ConversationSession::new(session_id, None));
        };

        let (state, version): (String, i64) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        let mut session = ConversationSession::from_document(&state)?;
        session.version = u64::try_from(version)
            .map_err(|_| PersistenceError::InvalidData(format!("negative version {}", version)))?;
        Ok(session)
    }

    async fn save(&self, session: &ConversationSession) -> Result<u64, PersistenceError> {
        let next_version = session.version + 1;
        let mut stored = session.clone();
        stored.version = next_version;
        let state = stored.to_document()?;
        let now = CqlTimestamp(Utc::now().timestamp_millis());

        let result = if session.is_new() {
            let query = format!(
                "INSERT INTO {}.conversation_sessions (
                    session_id, user_id, stage, state, version, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                self.client.keyspace()
            );
            self.client
                .session()
                .query_unpaged(
                    query,
                    (
                        &session.session_id,
                        &session.user_id,
                        session.stage.as_str(),
                        &state,
                        next_version as i64,
                        now,
                    ),
                )
                .await?
        } else {
            let query = format!(
                "UPDATE {}.conversation_sessions
                 SET user_id = ?, stage = ?, state = ?, version = ?, updated_at = ?
                 WHERE session_id = ? IF version = ?",
                self.client.keyspace()
            );
            self.client
                .session()
                .query_unpaged(
                    query,
                    (
                        &session.user_id,
                        session.stage.as_str(),
                        &state,
                        next_version as i64,
                        now,
                        &session.session_id,
                        session.version as i64,
                    ),
                )
                .await?
        };

        if !lwt_applied(result) {
            tracing::warn!(
                session_id = %session.session_id,
                expected = session.version,
                "Session save lost a concurrent update"
            );
            return Err(PersistenceError::Conflict {
                session_id: session.session_id.clone(),
                expected: session.version,
            });
        }

        tracing::debug!(
            session_id = %session.session_id,
            stage = %session.stage,
            version = next_version,
            "Session saved"
        );
        Ok(next_version)
    }

    async fn append_transcript(
        &self,
        session_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.conversation_transcript (
                session_id, created_at, entry_id, role, content
            ) VALUES (?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let created_at = CqlTimestamp(self.clock.now().timestamp_millis());
        self.client
            .session()
            .query_unpaged(
                query,
                (session_id, created_at, Uuid::new_v4(), role.as_str(), content),
            )
            .await?;
        Ok(())
    }

    async fn get_transcript(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TranscriptEntry>, PersistenceError> {
        let query = format!(
            "SELECT role, content, created_at FROM {}.conversation_transcript
             WHERE session_id = ? LIMIT ?",
            self.client.keyspace()
        );
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let result = self
            .client
            .session()
            .query_unpaged(query, (session_id, limit))
            .await?;

        // Stored newest first
        let mut entries = result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| row_to_entry(session_id, row))
            .collect::<Result<Vec<_>, _>>()?;
        entries.reverse();

        Ok(collapse_repeated_turns(entries))
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        self.client
            .session()
            .query_unpaged("SELECT release_version FROM system.local", &[])
            .await?;
        Ok(())
    }
}
