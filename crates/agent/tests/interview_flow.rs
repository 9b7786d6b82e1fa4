//! Integration tests for the interview flow (greeting -> recommendation)
//!
//! The model is replaced by a scripted backend so every transcript is
//! deterministic.

use std::sync::Arc;

use stack_advisor_agent::{
    messages, DomainKnowledgeStore, RetryPolicy, StageMachine, TransitionReason, TurnContext,
    TurnOutcome,
};
use stack_advisor_config::{PillarCatalog, PillarDefinition};
use stack_advisor_core::{ConversationSession, ConversationStage};
use stack_advisor_llm::mock::ScriptedBackend;
use stack_advisor_llm::LlmError;

const SCALE_Q1: &str = "How many users do you expect at launch?";
const SCALE_Q2: &str = "What growth do you expect over the next year?";
const SEC_Q1: &str = "What are your authentication requirements?";
const SEC_Q2: &str = "Will you store personal or regulated data?";

fn catalog() -> Arc<PillarCatalog> {
    Arc::new(
        PillarCatalog::new(vec![
            PillarDefinition {
                pillar: "Scalability".to_string(),
                questions: vec![SCALE_Q1.to_string(), SCALE_Q2.to_string()],
            },
            PillarDefinition {
                pillar: "Security".to_string(),
                questions: vec![SEC_Q1.to_string(), SEC_Q2.to_string()],
            },
        ])
        .unwrap(),
    )
}

fn machine(backend: &Arc<ScriptedBackend>) -> StageMachine {
    StageMachine::new(
        catalog(),
        Arc::new(DomainKnowledgeStore::default()),
        backend.clone(),
    )
    .with_retry_policy(RetryPolicy::immediate(3))
}

fn accepted(answer: &str) -> String {
    format!(
        r#"{{"answer_ready": true, "answer": "{}", "question": ""}}"#,
        answer
    )
}

fn session_in(stage: ConversationStage) -> ConversationSession {
    let mut session = ConversationSession::new("session-1", Some("user-1".to_string()));
    session.stage = stage;
    if stage > ConversationStage::ProjectDescription {
        session.initiative = Some("A patient management system for clinics".to_string());
    }
    if stage > ConversationStage::Domain {
        session.domain = Some("Healthcare".to_string());
    }
    session
}

#[tokio::test]
async fn test_first_message_greets() {
    let backend = Arc::new(ScriptedBackend::new());
    let sm = machine(&backend);

    let result = sm
        .advance(
            ConversationSession::new("session-1", None),
            "Hello",
            &TurnContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.session.stage, ConversationStage::ProjectDescription);
    assert_eq!(result.reply, messages::greeting("AI Solution Architect"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_project_description_sets_initiative() {
    let backend = Arc::new(ScriptedBackend::new());
    let sm = machine(&backend);

    let result = sm
        .advance(
            session_in(ConversationStage::ProjectDescription),
            "A patient management system for clinics",
            &TurnContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        result.session.initiative.as_deref(),
        Some("A patient management system for clinics")
    );
    assert_eq!(result.session.stage, ConversationStage::Domain);
    for domain in ["Education", "Healthcare", "Finance", "Logistics"] {
        assert!(result.reply.contains(domain), "missing {domain}");
    }
}

#[tokio::test]
async fn test_domain_opens_first_pillar() {
    let backend = Arc::new(ScriptedBackend::new());
    let sm = machine(&backend);

    let result = sm
        .advance(
            session_in(ConversationStage::Domain),
            "Healthcare",
            &TurnContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.session.domain.as_deref(), Some("Healthcare"));
    assert_eq!(result.session.stage, ConversationStage::PillarQuestions);
    assert_eq!(result.session.current_pillar.as_deref(), Some("Scalability"));
    assert!(result.reply.contains(SCALE_Q1));
    assert_eq!(
        result.transition.map(|t| t.reason),
        Some(TransitionReason::DomainCaptured)
    );
}

#[tokio::test]
async fn test_novel_domain_is_registered() {
    let backend = Arc::new(ScriptedBackend::new());
    let sm = machine(&backend);

    let result = sm
        .advance(
            session_in(ConversationStage::Domain),
            "Healthcare Robotics",
            &TurnContext::default(),
        )
        .await
        .unwrap();

    assert!(sm.domains().is_known("healthcare robotics"));
    assert!(result.reply.contains("Healthcare"));
    assert!(result
        .reply
        .contains("I'll analyze your specific requirements"));
}

#[tokio::test]
async fn test_last_answer_completes_pillar_and_opens_next() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_reply(accepted("Around 5k growing to 50k"));
    let sm = machine(&backend);

    let mut session = session_in(ConversationStage::PillarQuestions);
    session.start_pillar("Scalability");
    session.record_answer(SCALE_Q1, "5000 clinicians");

    let result = sm
        .advance(session, "Around 5k, maybe 50k in a year", &TurnContext::default())
        .await
        .unwrap();

    let session = result.session;
    assert_eq!(session.completed_pillars, vec!["Scalability".to_string()]);
    assert_eq!(session.current_pillar.as_deref(), Some("Security"));
    assert_eq!(
        session.answers_for("Scalability").unwrap().get(SCALE_Q2).map(String::as_str),
        Some("Around 5k growing to 50k")
    );
    assert!(result.reply.contains(SEC_Q1));
    assert_eq!(
        result.transition.map(|t| t.reason),
        Some(TransitionReason::PillarCompleted("Scalability".to_string()))
    );
}

#[tokio::test]
async fn test_last_pillar_moves_to_summary() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_reply(accepted("Yes, patient health records"));
    let sm = machine(&backend);

    let mut session = session_in(ConversationStage::PillarQuestions);
    session.start_pillar("Scalability");
    session.record_answer(SCALE_Q1, "5000");
    session.record_answer(SCALE_Q2, "10x");
    session.complete_current_pillar(&[SCALE_Q1.to_string(), SCALE_Q2.to_string()]);
    session.start_pillar("Security");
    session.record_answer(SEC_Q1, "SSO with MFA");

    let result = sm
        .advance(session, "Yes, patient health records", &TurnContext::default())
        .await
        .unwrap();

    let session = &result.session;
    assert_eq!(session.stage, ConversationStage::Summary);
    assert!(session.current_pillar.is_none());
    assert_eq!(
        session.completed_pillars,
        vec!["Scalability".to_string(), "Security".to_string()]
    );
    assert!(result.reply.contains("Summary of your inputs"));
    assert!(result.reply.contains("SSO with MFA"));
    assert_eq!(
        result.transition.map(|t| t.reason),
        Some(TransitionReason::PillarsExhausted)
    );
}

#[tokio::test]
async fn test_summary_confirmation_produces_stack() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_reply(r#"{"conversation": "Clinic system for 5k users with SSO"}"#)
        .push_reply(
            r#"{"Backend Language": {"top_recommendation": {"technology": "Rust", "use_case": "API services"},
                "alternative": {"technology": "Go", "use_case": "Simple services"}}}"#,
        );
    let sm = machine(&backend);

    let result = sm
        .advance(
            session_in(ConversationStage::Summary),
            "yes",
            &TurnContext::default(),
        )
        .await
        .unwrap();

    let session = &result.session;
    assert!(session.summary_confirmed);
    assert_eq!(session.stage, ConversationStage::EndOfConversation);
    let stack = session.recommended_stack.as_deref().unwrap();
    assert!(stack.contains("Rust (API services)"));
    assert!(result.reply.contains(stack));
    assert_eq!(backend.call_count(), 2);

    // Recommender sees the summary text
    let calls = backend.calls();
    assert!(calls[1]
        .iter()
        .any(|m| m.content.contains("Clinic system for 5k users with SSO")));
}

#[tokio::test]
async fn test_malformed_classification_reasks_question() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_reply("Great answer! answer_ready: yes");
    let sm = machine(&backend);

    let mut session = session_in(ConversationStage::PillarQuestions);
    session.start_pillar("Scalability");
    let before = session.clone();

    let result = sm
        .advance(session, "lots", &TurnContext::default())
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(result.reply, SCALE_Q1);
    assert_eq!(result.session.current_pillar, before.current_pillar);
    assert_eq!(result.session.pillar_responses, before.pillar_responses);
    assert_eq!(result.session.stage, ConversationStage::PillarQuestions);
}

#[tokio::test]
async fn test_vague_answer_gets_follow_up() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_reply(
        r#"{"answer_ready": false, "answer": "", "question": "Roughly how many concurrent users?"}"#,
    );
    let sm = machine(&backend);

    let mut session = session_in(ConversationStage::PillarQuestions);
    session.start_pillar("Scalability");

    let result = sm
        .advance(session, "some", &TurnContext::default())
        .await
        .unwrap();

    assert_eq!(result.reply, "Roughly how many concurrent users?");
    assert!(result
        .session
        .answers_for("Scalability")
        .map_or(true, |a| a.is_empty()));
}

#[tokio::test]
async fn test_generation_failure_leaves_session_untouched() {
    let backend = Arc::new(ScriptedBackend::new());
    for _ in 0..3 {
        backend.push_error(LlmError::Timeout);
    }
    let sm = machine(&backend);

    let mut session = session_in(ConversationStage::PillarQuestions);
    session.start_pillar("Scalability");
    let before = session.clone();

    let result = sm
        .advance(session, "5000 users", &TurnContext::default())
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::GenerationFailed);
    assert_eq!(result.reply, messages::GENERATION_APOLOGY);
    assert_eq!(result.session, before);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn test_failed_summary_hand_off_does_not_confirm() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_reply(r#"{"conversation": "Summary"}"#)
        .push_error(LlmError::Network("refused".into()))
        .push_error(LlmError::Network("refused".into()))
        .push_error(LlmError::Network("refused".into()));
    let sm = machine(&backend);

    let session = session_in(ConversationStage::Summary);
    let result = sm
        .advance(session.clone(), "yes", &TurnContext::default())
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::GenerationFailed);
    assert_eq!(result.session, session);
    assert!(!result.session.summary_confirmed);
    assert!(result.session.recommended_stack.is_none());
}

#[tokio::test]
async fn test_redelivery_after_failure_matches_first_attempt() {
    let mut session = session_in(ConversationStage::PillarQuestions);
    session.start_pillar("Scalability");

    let clean = Arc::new(ScriptedBackend::new());
    clean.push_reply(accepted("5000"));
    let expected = machine(&clean)
        .advance(session.clone(), "5000 users", &TurnContext::default())
        .await
        .unwrap();

    let flaky = Arc::new(ScriptedBackend::new());
    for _ in 0..3 {
        flaky.push_error(LlmError::Timeout);
    }
    flaky.push_reply(accepted("5000"));
    let sm = machine(&flaky);

    let failed = sm
        .advance(session, "5000 users", &TurnContext::default())
        .await
        .unwrap();
    assert_eq!(failed.outcome, TurnOutcome::GenerationFailed);

    let replayed = sm
        .advance(failed.session, "5000 users", &TurnContext::default())
        .await
        .unwrap();
    assert_eq!(replayed.session, expected.session);
    assert_eq!(replayed.reply, expected.reply);
}

#[tokio::test]
async fn test_full_interview_properties() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_reply(accepted("5000"))
        .push_reply("not json at all")
        .push_reply(accepted("10x"))
        .push_reply(accepted("SSO"))
        .push_reply(accepted("PHI"))
        .push_reply(r#"{"conversation": "Clinic app"}"#)
        .push_reply("Use Django and PostgreSQL.");
    let sm = machine(&backend);

    let turns = [
        "Hello",
        "A patient management system for clinics",
        "Healthcare",
        "5000 users",
        "it will grow",
        "tenfold",
        "SSO",
        "patient health information",
        "no",
        "yes",
        "thanks",
        "Finance",
    ];

    let mut session = ConversationSession::new("session-1", None);
    let mut stages = vec![session.stage];

    for message in turns {
        let previous = session.clone();
        let result = sm
            .advance(session, message, &TurnContext::default())
            .await
            .unwrap();
        assert_eq!(result.outcome, TurnOutcome::Completed, "turn {message:?}");
        session = result.session;

        // stages never go backwards
        assert!(session.stage >= previous.stage);
        // completed pillars only grow, each fully answered
        assert!(session.completed_pillars.starts_with(&previous.completed_pillars));
        for pillar in &session.completed_pillars {
            let answers = session.answers_for(pillar).unwrap();
            for question in sm.catalog().questions(pillar).unwrap() {
                assert!(answers.contains_key(question), "{pillar}: {question}");
            }
        }
        // write-once fields keep their first value
        if previous.initiative.is_some() {
            assert_eq!(session.initiative, previous.initiative);
        }
        if previous.domain.is_some() {
            assert_eq!(session.domain, previous.domain);
        }
        assert_eq!(session.interaction_count, previous.interaction_count + 1);
        stages.push(session.stage);
    }

    assert_eq!(session.stage, ConversationStage::EndOfConversation);
    assert_eq!(session.domain.as_deref(), Some("Healthcare"));
    assert_eq!(
        session.recommended_stack.as_deref(),
        Some("Use Django and PostgreSQL.")
    );
    assert_eq!(
        stages,
        vec![
            ConversationStage::Greeting,
            ConversationStage::ProjectDescription,
            ConversationStage::Domain,
            ConversationStage::PillarQuestions,
            ConversationStage::PillarQuestions,
            ConversationStage::PillarQuestions,
            ConversationStage::PillarQuestions,
            ConversationStage::PillarQuestions,
            ConversationStage::Summary,
            ConversationStage::Summary,
            ConversationStage::EndOfConversation,
            ConversationStage::EndOfConversation,
            ConversationStage::EndOfConversation,
        ]
    );
    assert_eq!(backend.call_count(), 7);
}
