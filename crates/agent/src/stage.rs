//! Interview stage machine
//!
//! `StageMachine::advance` takes the persisted session plus the new user
//! message and produces the next session and the reply. It never touches
//! the conversation store; saving the result is the caller's job.
//!
//! Stages move strictly forward:
//!
//! ```text
//! Greeting -> ProjectDescription -> Domain -> PillarQuestions* -> Summary* -> EndOfConversation
//! ```
//!
//! `PillarQuestions` loops until every catalog pillar is completed, in
//! catalog order. `Summary` loops until the user confirms it. A model failure
//! that survives the retry policy leaves the session exactly as it was.

use std::sync::Arc;

use stack_advisor_config::{AgentConfig, PillarCatalog};
use stack_advisor_core::{ConversationSession, ConversationStage, TranscriptEntry};
use stack_advisor_llm::LlmBackend;

use crate::domain_knowledge::DomainKnowledgeStore;
use crate::extractor::{ExtractionContext, ResponseExtractor};
use crate::messages;
use crate::recommendation::{RecommendationAgent, StackRecommender};
use crate::retry::{with_backoff, RetryPolicy};
use crate::AgentError;

/// Read-only context for one turn
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    /// Recent transcript, oldest first
    pub history: Vec<TranscriptEntry>,
}

impl TurnContext {
    pub fn new(history: Vec<TranscriptEntry>) -> Self {
        Self { history }
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The session advanced and should be saved
    Completed,
    /// Model calls were exhausted; the session is unchanged and nothing should be saved
    GenerationFailed,
}

/// Reason for stage transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionReason {
    Greeted,
    InitiativeCaptured,
    DomainCaptured,
    /// A pillar was completed and the next one opened
    PillarCompleted(String),
    /// No incomplete pillars remain
    PillarsExhausted,
    SummaryConfirmed,
}

/// Stage transition event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition {
    pub from: ConversationStage,
    pub to: ConversationStage,
    pub reason: TransitionReason,
}

/// Result of one `advance` call
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub session: ConversationSession,
    pub reply: String,
    pub outcome: TurnOutcome,
    pub transition: Option<StageTransition>,
}

struct Step {
    reply: String,
    reason: Option<TransitionReason>,
}

impl Step {
    fn stay(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            reason: None,
        }
    }

    fn moved(reply: impl Into<String>, reason: TransitionReason) -> Self {
        Self {
            reply: reply.into(),
            reason: Some(reason),
        }
    }
}

const AFFIRMATIVE: &[&str] = &[
    "yes",
    "y",
    "yeah",
    "yep",
    "yup",
    "sure",
    "ok",
    "okay",
    "correct",
    "confirm",
    "confirmed",
    "right",
    "proceed",
    "perfect",
    "looks good",
    "looks correct",
    "sounds good",
    "all good",
    "go ahead",
    "that's correct",
    "that is correct",
    "that's right",
];

/// True when `message` confirms the summary
pub fn is_affirmative(message: &str) -> bool {
    let normalized = message
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | ','))
        .to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    AFFIRMATIVE.contains(&normalized.as_str())
        || normalized.starts_with("yes ")
        || normalized.starts_with("yes,")
        || normalized.starts_with("yes!")
}

fn non_empty<'a>(message: &'a str, stage: ConversationStage) -> Result<&'a str, AgentError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AgentError::EmptyMessage(stage.as_str()));
    }
    Ok(trimmed)
}

fn is_answered(session: &ConversationSession, pillar: &str, question: &str) -> bool {
    session
        .answers_for(pillar)
        .map_or(false, |answers| answers.contains_key(question))
}

pub struct StageMachine {
    catalog: Arc<PillarCatalog>,
    domains: Arc<DomainKnowledgeStore>,
    extractor: ResponseExtractor,
    recommender: Arc<dyn StackRecommender>,
    retry: RetryPolicy,
    assistant_name: String,
}

impl StageMachine {
    pub fn new(
        catalog: Arc<PillarCatalog>,
        domains: Arc<DomainKnowledgeStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        let retry = RetryPolicy::default();
        Self {
            catalog,
            domains,
            extractor: ResponseExtractor::new(llm.clone()).with_retry_policy(retry),
            recommender: Arc::new(RecommendationAgent::new(llm)),
            retry,
            assistant_name: AgentConfig::default().assistant_name,
        }
    }

    pub fn from_config(
        config: &AgentConfig,
        catalog: Arc<PillarCatalog>,
        domains: Arc<DomainKnowledgeStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self::new(catalog, domains, llm)
            .with_retry_policy(RetryPolicy::from_config(config))
            .with_assistant_name(config.assistant_name.clone())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.extractor = self.extractor.with_retry_policy(retry);
        self
    }

    pub fn with_recommender(mut self, recommender: Arc<dyn StackRecommender>) -> Self {
        self.recommender = recommender;
        self
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn catalog(&self) -> &PillarCatalog {
        &self.catalog
    }

    pub fn domains(&self) -> &DomainKnowledgeStore {
        &self.domains
    }

    /// Compute the next session state and reply for `message`.
    ///
    /// Model failures are not errors here: they produce
    /// `TurnOutcome::GenerationFailed` with the input session untouched.
    pub async fn advance(
        &self,
        session: ConversationSession,
        message: &str,
        context: &TurnContext,
    ) -> Result<TurnResult, AgentError> {
        let from = session.stage;
        let mut next = session.clone();
        next.last_user_response = Some(message.to_string());

        let step = match from {
            ConversationStage::Greeting => Ok(self.greet(&mut next)),
            ConversationStage::ProjectDescription => self.capture_initiative(&mut next, message),
            ConversationStage::Domain => self.capture_domain(&mut next, message),
            ConversationStage::PillarQuestions => {
                self.answer_pillar(&mut next, message, context).await
            }
            ConversationStage::Summary => self.review_summary(&mut next, message, context).await,
            ConversationStage::EndOfConversation => Ok(self.closed(&next)),
        };

        match step {
            Ok(step) => {
                next.interaction_count += 1;
                let transition = step.reason.map(|reason| StageTransition {
                    from,
                    to: next.stage,
                    reason,
                });
                if let Some(t) = &transition {
                    tracing::info!(
                        session_id = %next.session_id,
                        from = %t.from,
                        to = %t.to,
                        reason = ?t.reason,
                        "Stage transition"
                    );
                }
                Ok(TurnResult {
                    session: next,
                    reply: step.reply,
                    outcome: TurnOutcome::Completed,
                    transition,
                })
            }
            Err(AgentError::Llm(e)) => {
                tracing::error!(
                    session_id = %session.session_id,
                    stage = %from,
                    attempts = self.retry.max_attempts,
                    error = %e,
                    "Generation failed, stage left unchanged"
                );
                Ok(TurnResult {
                    session,
                    reply: messages::GENERATION_APOLOGY.to_string(),
                    outcome: TurnOutcome::GenerationFailed,
                    transition: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn greet(&self, session: &mut ConversationSession) -> Step {
        session.transition_to(ConversationStage::ProjectDescription);
        Step::moved(
            messages::greeting(&self.assistant_name),
            TransitionReason::Greeted,
        )
    }

    fn capture_initiative(
        &self,
        session: &mut ConversationSession,
        message: &str,
    ) -> Result<Step, AgentError> {
        let initiative = non_empty(message, session.stage)?;
        session.set_initiative(initiative);
        session.transition_to(ConversationStage::Domain);
        Ok(Step::moved(
            messages::domain_question(&self.domains.common_domains()),
            TransitionReason::InitiativeCaptured,
        ))
    }

    fn capture_domain(
        &self,
        session: &mut ConversationSession,
        message: &str,
    ) -> Result<Step, AgentError> {
        let domain = non_empty(message, session.stage)?;
        session.set_domain(domain);

        let registration = self.domains.register(domain);
        let ack = if registration.is_new {
            messages::domain_added(
                &registration.domain,
                &registration.similar,
                &registration.insight,
            )
        } else {
            messages::domain_known(&registration.domain, &registration.insight)
        };

        let prompt = self.enter_next_pillar(session);
        Ok(Step::moved(
            format!("{}\n\n{}", ack, prompt),
            TransitionReason::DomainCaptured,
        ))
    }

    async fn answer_pillar(
        &self,
        session: &mut ConversationSession,
        message: &str,
        context: &TurnContext,
    ) -> Result<Step, AgentError> {
        let Some(pillar) = session.current_pillar.clone() else {
            return Ok(self.move_past_pillar(session, None));
        };

        let Some(questions) = self.catalog.questions(&pillar) else {
            tracing::warn!(
                session_id = %session.session_id,
                pillar = %pillar,
                "Open pillar is not in the catalog, closing it"
            );
            session.complete_current_pillar(&[]);
            return Ok(self.move_past_pillar(session, Some(pillar)));
        };

        let pending = self
            .catalog
            .first_unanswered(&pillar, |q| is_answered(session, &pillar, q))
            .map(str::to_string);
        let Some(question) = pending else {
            session.complete_current_pillar(questions);
            return Ok(self.move_past_pillar(session, Some(pillar)));
        };

        let answer = non_empty(message, session.stage)?;
        let extraction = ExtractionContext {
            initiative: session.initiative.as_deref(),
            domain: session.domain.as_deref(),
            pillar: &pillar,
            history: &context.history,
        };
        let classification = self.extractor.classify(&extraction, &question, answer).await?;

        if !classification.accepted {
            return Ok(Step::stay(
                classification.follow_up_question.unwrap_or(question),
            ));
        }

        let normalized = classification
            .normalized_answer
            .unwrap_or_else(|| answer.to_string());
        session.record_answer(question, normalized);

        let next_question = self
            .catalog
            .first_unanswered(&pillar, |q| is_answered(session, &pillar, q));
        match next_question {
            Some(next) => Ok(Step::stay(next)),
            None => {
                session.complete_current_pillar(questions);
                tracing::debug!(
                    session_id = %session.session_id,
                    pillar = %pillar,
                    "Pillar completed"
                );
                Ok(self.move_past_pillar(session, Some(pillar)))
            }
        }
    }

    /// Open the next pillar or move to the summary once none remain.
    fn move_past_pillar(&self, session: &mut ConversationSession, completed: Option<String>) -> Step {
        let reply = self.enter_next_pillar(session);
        if session.stage == ConversationStage::Summary {
            Step::moved(reply, TransitionReason::PillarsExhausted)
        } else {
            match completed {
                Some(pillar) => Step::moved(reply, TransitionReason::PillarCompleted(pillar)),
                None => Step::stay(reply),
            }
        }
    }

    fn enter_next_pillar(&self, session: &mut ConversationSession) -> String {
        loop {
            let Some(pillar) = self.catalog.next_incomplete(&session.completed_pillars) else {
                session.transition_to(ConversationStage::Summary);
                return messages::summary(session, &self.catalog);
            };

            let question = self
                .catalog
                .first_unanswered(pillar, |q| is_answered(session, pillar, q))
                .map(str::to_string);
            session.transition_to(ConversationStage::PillarQuestions);
            session.start_pillar(pillar);

            match question {
                Some(question) => return messages::pillar_intro(pillar, &question),
                None => {
                    let questions = self.catalog.questions(pillar).unwrap_or_default();
                    session.complete_current_pillar(questions);
                }
            }
        }
    }

    async fn review_summary(
        &self,
        session: &mut ConversationSession,
        message: &str,
        context: &TurnContext,
    ) -> Result<Step, AgentError> {
        if !is_affirmative(message) {
            return Ok(Step::stay(format!(
                "{}\n\n{}",
                messages::CONFIRM_SUMMARY,
                messages::summary(session, &self.catalog)
            )));
        }

        let mut transcript = context.history.clone();
        transcript.push(TranscriptEntry::user(session.session_id.clone(), message));

        let recommender = self.recommender.as_ref();
        let summary = with_backoff(&self.retry, "summarize", || {
            recommender.summarize(&transcript)
        })
        .await?;

        let summary_text = summary.as_str();
        let responses = &session.pillar_responses;
        let stack = with_backoff(&self.retry, "recommend", || {
            recommender.recommend(summary_text, responses)
        })
        .await?;

        session.confirm_summary();
        session.set_recommended_stack(stack.clone());
        session.transition_to(ConversationStage::EndOfConversation);
        Ok(Step::moved(
            messages::stack_reply(&stack),
            TransitionReason::SummaryConfirmed,
        ))
    }

    fn closed(&self, session: &ConversationSession) -> Step {
        match &session.recommended_stack {
            Some(stack) => Step::stay(messages::stack_reply(stack)),
            None => Step::stay(messages::CLOSING),
        }
    }
}
