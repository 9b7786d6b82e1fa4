//! In-memory conversation store
//!
//! Used when ScyllaDB persistence is disabled, and by tests. Same
//! compare-and-swap semantics as the ScyllaDB store; nothing survives a restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use stack_advisor_core::{ConversationSession, TranscriptEntry, TurnRole};

use crate::store::{collapse_repeated_turns, ConversationStore, MonotonicClock};
use crate::PersistenceError;

#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, ConversationSession>>,
    transcripts: RwLock<HashMap<String, Vec<TranscriptEntry>>>,
    clock: MonotonicClock,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Every stored transcript entry, oldest first, without collapsing
    pub fn raw_transcript(&self, session_id: &str) -> Vec<TranscriptEntry> {
        self.transcripts
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, session_id: &str) -> Result<ConversationSession, PersistenceError> {
        Ok(self
            .sessions
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| ConversationSession::new(session_id, None)))
    }

    async fn save(&self, session: &ConversationSession) -> Result<u64, PersistenceError> {
        let mut sessions = self.sessions.write();
        let stored_version = sessions.get(&session.session_id).map_or(0, |s| s.version);
        if stored_version != session.version {
            return Err(PersistenceError::Conflict {
                session_id: session.session_id.clone(),
                expected: session.version,
            });
        }

        let mut stored = session.clone();
        stored.version = session.version + 1;
        stored.last_user_response = None;
        let version = stored.version;
        sessions.insert(session.session_id.clone(), stored);
        Ok(version)
    }

    async fn append_transcript(
        &self,
        session_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), PersistenceError> {
        let mut entry = TranscriptEntry::new(session_id, role, content);
        entry.created_at = self.clock.now();
        self.transcripts
            .write()
            .entry(session_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn get_transcript(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TranscriptEntry>, PersistenceError> {
        let all = self.raw_transcript(session_id);
        let recent = all[all.len().saturating_sub(limit)..].to_vec();
        Ok(collapse_repeated_turns(recent))
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_advisor_core::ConversationStage;

    #[tokio::test]
    async fn test_load_missing_returns_default() {
        let store = InMemoryConversationStore::new();
        let session = store.load("unknown").await.unwrap();
        assert_eq!(session.session_id, "unknown");
        assert_eq!(session.stage, ConversationStage::Greeting);
        assert!(session.is_new());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let store = InMemoryConversationStore::new();
        let mut session = store.load("s1").await.unwrap();
        session.stage = ConversationStage::ProjectDescription;

        assert_eq!(store.save(&session).await.unwrap(), 1);
        let loaded = store.load("s1").await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.stage, ConversationStage::ProjectDescription);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = InMemoryConversationStore::new();
        let first = store.load("s1").await.unwrap();
        let second = first.clone();

        store.save(&first).await.unwrap();
        let err = store.save(&second).await.unwrap_err();
        assert!(err.is_conflict());

        // Stored state is the first writer's
        assert_eq!(store.load("s1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_transcript_limit_and_order() {
        let store = InMemoryConversationStore::new();
        for i in 0..5 {
            store
                .append_transcript("s1", TurnRole::User, &format!("u{i}"))
                .await
                .unwrap();
            store
                .append_transcript("s1", TurnRole::Assistant, &format!("a{i}"))
                .await
                .unwrap();
        }

        let recent = store.get_transcript("s1", 4).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["u3", "a3", "u4", "a4"]);
        assert!(recent.windows(2).all(|w| w[0].created_at < w[1].created_at));
        assert!(store.get_transcript("other", 10).await.unwrap().is_empty());
    }
}
