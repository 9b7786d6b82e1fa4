//! Turn orchestration
//!
//! One user message in, one assistant reply out. Each turn loads the session
//! and recent transcript, runs the stage machine, saves the new session with
//! a version check and appends the exchange to the transcript.
//!
//! Turns for the same session are serialized in-process by a per-session
//! lock. Across processes the store's version check catches the race; the
//! losing turn is re-run against the winner's state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use stack_advisor_agent::{messages, StageMachine, TurnContext, TurnOutcome};
use stack_advisor_config::AgentConfig;
use stack_advisor_core::{ConversationSession, ConversationStage, TurnRole};
use stack_advisor_persistence::ConversationStore;

use crate::metrics::{record_store_conflict, record_turn};
use crate::ServerError;

/// How a turn ended, as reported to callers and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// State advanced and was saved
    Completed,
    /// Empty input, nothing changed
    EmptyInput,
    /// Model unavailable after retries, nothing changed
    GenerationFailed,
    /// Storage or internal failure
    Failed,
    /// Turn exceeded its time budget
    TimedOut,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Completed => "completed",
            TurnStatus::EmptyInput => "empty_input",
            TurnStatus::GenerationFailed => "generation_failed",
            TurnStatus::Failed => "failed",
            TurnStatus::TimedOut => "timed_out",
        }
    }
}

/// Reply for one user turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub session_id: String,
    pub response: String,
    /// Stage after the turn; `None` when the session was not read
    pub stage: Option<ConversationStage>,
    pub status: TurnStatus,
}

impl TurnReply {
    fn new(
        session_id: &str,
        response: impl Into<String>,
        stage: Option<ConversationStage>,
        status: TurnStatus,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            response: response.into(),
            stage,
            status,
        }
    }
}

pub struct TurnOrchestrator {
    machine: Arc<StageMachine>,
    store: Arc<dyn ConversationStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    conflict_retries: u32,
    turn_timeout: Duration,
    history_limit: usize,
}

impl TurnOrchestrator {
    pub fn new(machine: Arc<StageMachine>, store: Arc<dyn ConversationStore>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            machine,
            store,
            locks: DashMap::new(),
            conflict_retries: defaults.conflict_retries,
            turn_timeout: Duration::from_millis(defaults.turn_timeout_ms),
            history_limit: defaults.history_limit,
        }
    }

    pub fn from_config(
        config: &AgentConfig,
        machine: Arc<StageMachine>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self::new(machine, store)
            .with_conflict_retries(config.conflict_retries)
            .with_turn_timeout(Duration::from_millis(config.turn_timeout_ms))
            .with_history_limit(config.history_limit)
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Sessions with a turn in flight or waiting
    pub fn active_sessions(&self) -> usize {
        self.locks.len()
    }

    /// Persist a fresh session and return its id
    pub async fn create_session(&self, user_id: Option<String>) -> Result<String, ServerError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = ConversationSession::new(session_id.clone(), user_id);
        self.store.save(&session).await?;
        tracing::info!(session_id = %session_id, "Created conversation session");
        Ok(session_id)
    }

    /// Stored session, or `None` if it has never been saved
    pub async fn snapshot(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationSession>, ServerError> {
        let session = self.store.load(session_id).await?;
        Ok((!session.is_new()).then_some(session))
    }

    /// Handle one user message. Always produces user-facing text.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        message: &str,
    ) -> TurnReply {
        let started = Instant::now();

        let reply = if message.trim().is_empty() {
            TurnReply::new(session_id, messages::NO_INPUT, None, TurnStatus::EmptyInput)
        } else {
            let lock = self.session_lock(session_id);
            let result = {
                let _guard = lock.lock().await;
                tokio::time::timeout(
                    self.turn_timeout,
                    self.run_turn(session_id, user_id, message.trim()),
                )
                .await
            };
            self.release_lock(session_id, lock);

            match result {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    tracing::error!(session_id = %session_id, error = %e, "Turn failed");
                    TurnReply::new(
                        session_id,
                        messages::TECHNICAL_DIFFICULTIES,
                        None,
                        TurnStatus::Failed,
                    )
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %session_id,
                        timeout_ms = self.turn_timeout.as_millis() as u64,
                        "Turn timed out"
                    );
                    TurnReply::new(session_id, messages::TURN_TIMEOUT, None, TurnStatus::TimedOut)
                }
            }
        };

        record_turn(reply.status.as_str(), started.elapsed());
        reply
    }

    async fn run_turn(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        message: &str,
    ) -> Result<TurnReply, ServerError> {
        let mut conflicts = 0;
        loop {
            let mut session = self.store.load(session_id).await?;
            if session.is_new() && session.user_id.is_none() {
                session.user_id = user_id.map(str::to_string);
            }
            let history = self
                .store
                .get_transcript(session_id, self.history_limit)
                .await?;

            let result = self
                .machine
                .advance(session, message, &TurnContext::new(history))
                .await?;

            if result.outcome == TurnOutcome::GenerationFailed {
                return Ok(TurnReply::new(
                    session_id,
                    result.reply,
                    Some(result.session.stage),
                    TurnStatus::GenerationFailed,
                ));
            }

            match self.store.save(&result.session).await {
                Ok(version) => {
                    if let Some(transition) = &result.transition {
                        tracing::info!(
                            session_id = %session_id,
                            from = %transition.from,
                            to = %transition.to,
                            reason = ?transition.reason,
                            version,
                            "Stage transition"
                        );
                    }
                    self.append_exchange(session_id, message, &result.reply).await;
                    return Ok(TurnReply::new(
                        session_id,
                        result.reply,
                        Some(result.session.stage),
                        TurnStatus::Completed,
                    ));
                }
                Err(e) if e.is_conflict() => {
                    record_store_conflict();
                    if conflicts >= self.conflict_retries {
                        return Err(e.into());
                    }
                    conflicts += 1;
                    tracing::warn!(
                        session_id = %session_id,
                        attempt = conflicts,
                        "Session changed during turn, retrying against latest state"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Transcript writes after a committed save are best effort
    async fn append_exchange(&self, session_id: &str, message: &str, reply: &str) {
        for (role, content) in [(TurnRole::User, message), (TurnRole::Assistant, reply)] {
            if let Err(e) = self
                .store
                .append_transcript(session_id, role, content)
                .await
            {
                tracing::warn!(
                    session_id = %session_id,
                    role = role.as_str(),
                    error = %e,
                    "Failed to append transcript entry"
                );
            }
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other turn holds or awaits it
    fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        self.locks.remove_if(session_id, |_, entry| {
            Arc::ptr_eq(entry, &lock) && Arc::strong_count(entry) == 2
        });
    }
}
