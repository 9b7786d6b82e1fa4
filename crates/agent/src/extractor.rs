//! Pillar answer extraction
//!
//! The model judges whether a reply answers the pending question and returns
//! `{answer_ready, answer, question}`. Output that does not match that contract
//! is never trusted: the extractor falls back to re-asking the original
//! question. Only transport-level failures surface as errors.

use serde_json::Value;
use std::sync::Arc;

use stack_advisor_core::TranscriptEntry;
use stack_advisor_llm::{extract_json_object, LlmBackend, LlmError};

use crate::prompts;
use crate::retry::{with_backoff, RetryPolicy};

/// What the model sees besides the question and the raw answer
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub initiative: Option<&'a str>,
    pub domain: Option<&'a str>,
    pub pillar: &'a str,
    /// Recent transcript, oldest first
    pub history: &'a [TranscriptEntry],
}

/// Decision for one pillar answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub accepted: bool,
    pub normalized_answer: Option<String>,
    pub follow_up_question: Option<String>,
}

impl Classification {
    pub fn accepted(answer: impl Into<String>) -> Self {
        Self {
            accepted: true,
            normalized_answer: Some(answer.into()),
            follow_up_question: None,
        }
    }

    pub fn follow_up(question: impl Into<String>) -> Self {
        Self {
            accepted: false,
            normalized_answer: None,
            follow_up_question: Some(question.into()),
        }
    }
}

/// Validate raw model output against the marker contract.
///
/// Returns `None` when the output cannot be trusted.
pub fn parse_marker(output: &str) -> Option<Classification> {
    let json = extract_json_object(output)?;
    let value: Value = serde_json::from_str(json).ok()?;
    let object = value.as_object()?;

    let ready = object.get("answer_ready")?.as_bool()?;
    let text_field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if ready {
        text_field("answer").map(Classification::accepted)
    } else {
        text_field("question").map(Classification::follow_up)
    }
}

pub struct ResponseExtractor {
    llm: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
}

impl ResponseExtractor {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self {
            llm,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Classify `raw_answer` as a reply to `question`.
    ///
    /// Malformed model output yields a follow-up carrying `question` unchanged.
    pub async fn classify(
        &self,
        context: &ExtractionContext<'_>,
        question: &str,
        raw_answer: &str,
    ) -> Result<Classification, LlmError> {
        let messages = prompts::pillar_marker_messages(context, question, raw_answer);
        let output = with_backoff(&self.retry, "classify", || self.llm.generate(&messages)).await?;

        match parse_marker(&output.text) {
            Some(classification) => {
                tracing::debug!(
                    pillar = context.pillar,
                    accepted = classification.accepted,
                    "Classified pillar answer"
                );
                Ok(classification)
            }
            None => {
                tracing::warn!(
                    pillar = context.pillar,
                    raw_output = %output.text,
                    "Malformed answer classification, re-asking question"
                );
                Ok(Classification::follow_up(question))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_advisor_llm::mock::ScriptedBackend;

    fn context() -> ExtractionContext<'static> {
        ExtractionContext {
            initiative: Some("Clinic app"),
            domain: Some("Healthcare"),
            pillar: "Security",
            history: &[],
        }
    }

    #[test]
    fn test_parse_marker_accepts_fenced_json() {
        let output = "```json\n{\"answer_ready\": true, \"answer\": \" OAuth with MFA \", \"question\": \"\"}\n```";
        assert_eq!(
            parse_marker(output),
            Some(Classification::accepted("OAuth with MFA"))
        );
    }

    #[test]
    fn test_parse_marker_follow_up() {
        let output = r#"{"answer_ready": false, "answer": "", "question": "Which identity provider?"}"#;
        assert_eq!(
            parse_marker(output),
            Some(Classification::follow_up("Which identity provider?"))
        );
    }

    #[test]
    fn test_parse_marker_rejects_invalid() {
        // not JSON
        assert_eq!(parse_marker("Sure, sounds good"), None);
        // single-quoted keys
        assert_eq!(parse_marker("{'answer_ready': true, 'answer': 'x'}"), None);
        // answer_ready must be a bool
        assert_eq!(parse_marker(r#"{"answer_ready": "yes", "answer": "x"}"#), None);
        // ready without an answer
        assert_eq!(parse_marker(r#"{"answer_ready": true, "answer": "  "}"#), None);
        // not ready without a question
        assert_eq!(parse_marker(r#"{"answer_ready": false}"#), None);
        // top-level array
        assert_eq!(parse_marker(r#"[{"answer_ready": true}]"#), None);
    }

    #[tokio::test]
    async fn test_classify_fails_closed() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_reply("I think the answer is fine");
        let extractor = ResponseExtractor::new(backend.clone());

        let result = extractor
            .classify(&context(), "Do you store PII?", "yes, lots")
            .await
            .unwrap();
        assert_eq!(result, Classification::follow_up("Do you store PII?"));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_classify_retries_transport_errors() {
        let backend = Arc::new(ScriptedBackend::new());
        backend
            .push_error(LlmError::Timeout)
            .push_reply(r#"{"answer_ready": true, "answer": "Yes, patient records"}"#);
        let extractor =
            ResponseExtractor::new(backend.clone()).with_retry_policy(RetryPolicy::immediate(3));

        let result = extractor
            .classify(&context(), "Do you store PII?", "yes, patient records")
            .await
            .unwrap();
        assert!(result.accepted);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_classify_propagates_exhaustion() {
        let backend = Arc::new(ScriptedBackend::new());
        for _ in 0..3 {
            backend.push_error(LlmError::Network("refused".into()));
        }
        let extractor =
            ResponseExtractor::new(backend.clone()).with_retry_policy(RetryPolicy::immediate(3));

        let result = extractor.classify(&context(), "Q?", "A").await;
        assert!(matches!(result, Err(LlmError::Network(_))));
        assert_eq!(backend.call_count(), 3);
    }
}
