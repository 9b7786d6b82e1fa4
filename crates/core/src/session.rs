//! Durable interview state
//!
//! `ConversationSession` is the single mutable record kept per conversation.
//! Mutators enforce the write-once and monotonic rules; a violating write is a
//! programming defect. Debug builds panic on it, release builds log it, drop the
//! write and keep the prior value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conversation::ConversationStage;

/// question -> answer
pub type PillarAnswers = BTreeMap<String, String>;

/// pillar -> (question -> answer)
pub type PillarResponses = BTreeMap<String, PillarAnswers>;

/// Report a broken session invariant.
///
/// Panics when debug assertions are enabled, otherwise logs at error level.
pub fn invariant_violation(session_id: &str, field: &'static str, message: &str) {
    if cfg!(debug_assertions) {
        panic!("session {session_id}: invariant violated on `{field}`: {message}");
    }
    tracing::error!(
        session_id = %session_id,
        field = field,
        "Invariant violation ignored: {}",
        message
    );
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub stage: ConversationStage,
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub initiative: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub pillar_responses: PillarResponses,
    /// Completion order is preserved; entries are unique
    #[serde(default)]
    pub completed_pillars: Vec<String>,
    #[serde(default)]
    pub current_pillar: Option<String>,
    #[serde(default)]
    pub summary_confirmed: bool,
    #[serde(default)]
    pub recommended_stack: Option<String>,
    /// Raw utterance for the turn in progress, never persisted
    #[serde(skip)]
    pub last_user_response: Option<String>,
    /// Optimistic concurrency counter, 0 means never saved
    #[serde(default)]
    pub version: u64,
}

impl ConversationSession {
    pub fn new(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            stage: ConversationStage::Greeting,
            interaction_count: 0,
            initiative: None,
            domain: None,
            pillar_responses: PillarResponses::new(),
            completed_pillars: Vec::new(),
            current_pillar: None,
            summary_confirmed: false,
            recommended_stack: None,
            last_user_response: None,
            version: 0,
        }
    }

    /// True when the session has never been persisted
    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    /// Move to `target`, refusing backward moves.
    pub fn transition_to(&mut self, target: ConversationStage) {
        if !self.stage.can_transition_to(target) {
            invariant_violation(
                &self.session_id,
                "stage",
                &format!("illegal transition {} -> {}", self.stage, target),
            );
            return;
        }
        self.stage = target;
    }

    /// Write-once project description
    pub fn set_initiative(&mut self, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = &self.initiative {
            if *existing != value {
                invariant_violation(&self.session_id, "initiative", "already set");
            }
            return;
        }
        self.initiative = Some(value);
    }

    /// Write-once domain classification
    pub fn set_domain(&mut self, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = &self.domain {
            if *existing != value {
                invariant_violation(&self.session_id, "domain", "already set");
            }
            return;
        }
        self.domain = Some(value);
    }

    pub fn is_pillar_completed(&self, pillar: &str) -> bool {
        self.completed_pillars.iter().any(|p| p == pillar)
    }

    /// Answers recorded so far for `pillar`
    pub fn answers_for(&self, pillar: &str) -> Option<&PillarAnswers> {
        self.pillar_responses.get(pillar)
    }

    /// Begin working on `pillar`. Only allowed when no other pillar is open.
    pub fn start_pillar(&mut self, pillar: impl Into<String>) {
        let pillar = pillar.into();
        match &self.current_pillar {
            Some(current) if *current == pillar => return,
            Some(current) => {
                invariant_violation(
                    &self.session_id,
                    "current_pillar",
                    &format!("cannot start '{}' while '{}' is open", pillar, current),
                );
                return;
            }
            None => {}
        }
        if self.is_pillar_completed(&pillar) {
            invariant_violation(
                &self.session_id,
                "current_pillar",
                &format!("pillar '{}' is already completed", pillar),
            );
            return;
        }
        self.pillar_responses.entry(pillar.clone()).or_default();
        self.current_pillar = Some(pillar);
    }

    /// Record an answer under the open pillar.
    pub fn record_answer(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let Some(pillar) = self.current_pillar.clone() else {
            invariant_violation(&self.session_id, "pillar_responses", "no open pillar");
            return;
        };
        self.pillar_responses
            .entry(pillar)
            .or_default()
            .insert(question.into(), answer.into());
    }

    /// Close the open pillar. Every question in `questions` must already be answered.
    pub fn complete_current_pillar(&mut self, questions: &[String]) {
        let Some(pillar) = self.current_pillar.clone() else {
            invariant_violation(&self.session_id, "completed_pillars", "no open pillar");
            return;
        };
        let answered = self.pillar_responses.get(&pillar);
        let missing = questions
            .iter()
            .filter(|q| answered.map_or(true, |a| !a.contains_key(*q)))
            .count();
        if missing > 0 {
            invariant_violation(
                &self.session_id,
                "completed_pillars",
                &format!("pillar '{}' has {} unanswered questions", pillar, missing),
            );
            return;
        }
        if !self.is_pillar_completed(&pillar) {
            self.completed_pillars.push(pillar);
        }
        self.current_pillar = None;
    }

    pub fn confirm_summary(&mut self) {
        self.summary_confirmed = true;
    }

    /// Write-once recommendation, only after the summary is confirmed
    pub fn set_recommended_stack(&mut self, stack: impl Into<String>) {
        if !self.summary_confirmed {
            invariant_violation(
                &self.session_id,
                "recommended_stack",
                "summary not confirmed",
            );
            return;
        }
        if self.recommended_stack.is_some() {
            invariant_violation(&self.session_id, "recommended_stack", "already set");
            return;
        }
        self.recommended_stack = Some(stack.into());
    }

    /// Serialize to the persisted document form
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_document(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_session_defaults() {
        let session = ConversationSession::new("s1", None);
        assert_eq!(session.stage, ConversationStage::Greeting);
        assert!(session.is_new());
        assert!(session.pillar_responses.is_empty());
        assert!(session.completed_pillars.is_empty());
        assert!(session.current_pillar.is_none());
    }

    #[test]
    fn test_initiative_same_value_is_noop() {
        let mut session = ConversationSession::new("s1", None);
        session.set_initiative("A clinic app");
        session.set_initiative("A clinic app");
        assert_eq!(session.initiative.as_deref(), Some("A clinic app"));
    }

    #[test]
    #[should_panic(expected = "initiative")]
    fn test_initiative_overwrite_panics_in_debug() {
        let mut session = ConversationSession::new("s1", None);
        session.set_initiative("first");
        session.set_initiative("second");
    }

    #[test]
    #[should_panic(expected = "domain")]
    fn test_domain_overwrite_panics_in_debug() {
        let mut session = ConversationSession::new("s1", None);
        session.set_domain("Healthcare");
        session.set_domain("Finance");
    }

    #[test]
    #[should_panic(expected = "illegal transition")]
    fn test_backward_transition_panics() {
        let mut session = ConversationSession::new("s1", None);
        session.transition_to(ConversationStage::ProjectDescription);
        session.transition_to(ConversationStage::Greeting);
    }

    #[test]
    fn test_pillar_lifecycle() {
        let mut session = ConversationSession::new("s1", None);
        let qs = questions(&["Q1", "Q2"]);
        session.start_pillar("Security");
        session.record_answer("Q1", "A1");
        session.record_answer("Q2", "A2");
        session.complete_current_pillar(&qs);

        assert!(session.current_pillar.is_none());
        assert_eq!(session.completed_pillars, vec!["Security".to_string()]);
        assert_eq!(session.answers_for("Security").map(|a| a.len()), Some(2));
    }

    #[test]
    #[should_panic(expected = "unanswered")]
    fn test_completing_partial_pillar_panics() {
        let mut session = ConversationSession::new("s1", None);
        session.start_pillar("Security");
        session.record_answer("Q1", "A1");
        session.complete_current_pillar(&questions(&["Q1", "Q2"]));
    }

    #[test]
    #[should_panic(expected = "summary not confirmed")]
    fn test_stack_requires_confirmation() {
        let mut session = ConversationSession::new("s1", None);
        session.set_recommended_stack("Rust + Postgres");
    }

    #[test]
    fn test_document_skips_transient_fields() {
        let mut session = ConversationSession::new("s1", Some("u1".to_string()));
        session.last_user_response = Some("hello".to_string());
        session.set_initiative("A clinic app");

        let doc = session.to_document().unwrap();
        assert!(!doc.contains("hello"));

        let restored = ConversationSession::from_document(&doc).unwrap();
        assert_eq!(restored.initiative.as_deref(), Some("A clinic app"));
        assert_eq!(restored.user_id.as_deref(), Some("u1"));
        assert!(restored.last_user_response.is_none());
    }
}
