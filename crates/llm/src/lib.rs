//! LLM integration
//!
//! Features:
//! - Backend trait with Ollama and OpenAI-compatible implementations
//! - Provider factory driven by settings
//! - Chat message types and output cleanup helpers

pub mod backend;
pub mod factory;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod prompt;

pub use backend::{
    FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend,
    OpenAIConfig,
};
pub use factory::create_backend;
pub use prompt::{extract_json_object, strip_control_tokens, Message, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Network(_)
                | LlmError::Timeout
                | LlmError::Generation(_)
                | LlmError::InvalidResponse(_)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout.is_retryable());
        assert!(LlmError::Network("reset".into()).is_retryable());
        assert!(!LlmError::Api("HTTP 400".into()).is_retryable());
        assert!(!LlmError::Configuration("no key".into()).is_retryable());
        assert!(!LlmError::ModelNotFound("m".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_scripted_backend_order_and_fallback() {
        let backend = mock::ScriptedBackend::new().with_fallback("later");
        backend.push_reply("first").push_error(LlmError::Timeout);

        let msgs = [Message::user("q")];
        assert_eq!(backend.generate(&msgs).await.unwrap().text, "first");
        assert!(matches!(backend.generate(&msgs).await, Err(LlmError::Timeout)));
        assert_eq!(backend.generate(&msgs).await.unwrap().text, "later");
        assert_eq!(backend.call_count(), 3);
    }
}
