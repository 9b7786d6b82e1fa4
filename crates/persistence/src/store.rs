//! Conversation store contract
//!
//! Two kinds of records per conversation:
//! - one mutable session document, saved with an optimistic version check
//! - an append-only transcript, independent of the session document

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use stack_advisor_core::{ConversationSession, TranscriptEntry, TurnRole};

use crate::PersistenceError;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load a session; an unknown id yields a fresh default session.
    async fn load(&self, session_id: &str) -> Result<ConversationSession, PersistenceError>;

    /// Upsert the session if its `version` still matches the stored one.
    ///
    /// Returns the new version. A lost race is `PersistenceError::Conflict`.
    async fn save(&self, session: &ConversationSession) -> Result<u64, PersistenceError>;

    async fn append_transcript(
        &self,
        session_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), PersistenceError>;

    /// Up to `limit` most recent entries, oldest first, with repeated turns collapsed
    async fn get_transcript(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TranscriptEntry>, PersistenceError>;

    async fn health_check(&self) -> Result<(), PersistenceError>;
}

/// Drop a (user, assistant) pair that exactly repeats the pair before it.
///
/// Input and output are in chronological order.
pub fn collapse_repeated_turns(entries: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    let mut out: Vec<TranscriptEntry> = Vec::with_capacity(entries.len());
    let mut iter = entries.into_iter().peekable();

    while let Some(entry) = iter.next() {
        let pairs_with_next = entry.role == TurnRole::User
            && iter.peek().map_or(false, |next| next.role == TurnRole::Assistant);
        if !pairs_with_next {
            out.push(entry);
            continue;
        }

        let Some(reply) = iter.next() else {
            out.push(entry);
            break;
        };
        let repeated = match out.as_slice() {
            [.., prev_user, prev_reply] => {
                prev_user.role == TurnRole::User
                    && prev_reply.role == TurnRole::Assistant
                    && prev_user.content == entry.content
                    && prev_reply.content == reply.content
            }
            _ => false,
        };
        if !repeated {
            out.push(entry);
            out.push(reply);
        }
    }
    out
}

/// Millisecond clock that never repeats or goes backwards.
///
/// Transcript rows are ordered by `created_at`; a user entry and the reply
/// appended right after it must not share a timestamp.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return DateTime::from_timestamp_millis(next).unwrap_or_else(Utc::now),
                Err(actual) => prev = actual,
            }
        }
    }
}
