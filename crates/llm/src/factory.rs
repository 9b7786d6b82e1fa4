//! LLM Factory
//!
//! Creates the configured backend from `agent.llm` settings.
//!
//! ## Supported Providers
//! - **Ollama**: local models via `/api/chat`
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint

use std::sync::Arc;
use std::time::Duration;

use stack_advisor_config::{LlmConfig as LlmSettings, LlmProvider};

use crate::backend::{LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend, OpenAIConfig};
use crate::LlmError;

/// Build a backend for the configured provider
pub fn create_backend(settings: &LlmSettings) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let timeout = Duration::from_millis(settings.request_timeout_ms);
    let endpoint = settings.resolved_endpoint().to_string();

    let backend: Arc<dyn LlmBackend> = match settings.provider {
        LlmProvider::Ollama => Arc::new(OllamaBackend::new(LlmConfig {
            model: settings.model.clone(),
            endpoint,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout,
            ..Default::default()
        })?),
        LlmProvider::OpenAi => Arc::new(OpenAIBackend::new(OpenAIConfig {
            endpoint,
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout,
        })?),
    };

    tracing::info!(
        provider = ?settings.provider,
        model = %backend.model_name(),
        "Created LLM backend"
    );
    Ok(backend)
}
