//! LLM Backend implementations
//!
//! Each backend performs exactly one HTTP request per `generate` call.
//! Retrying is the caller's decision; see `LlmError::is_retryable`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::prompt::Message;
use crate::LlmError;

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature
    pub temperature: f32,
    /// Top-p sampling
    pub top_p: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Keep model loaded in memory between calls ("5m", "1h", "-1", "0")
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1:8b-instruct-q4_K_M".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            top_p: 0.9,
            timeout: Duration::from_secs(30),
            keep_alive: "5m".to_string(),
        }
    }
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Tokens generated
    pub tokens: usize,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

impl GenerationResult {
    /// Result with only text, used by tests and adapters
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: 0,
            total_time_ms: 0,
            finish_reason: FinishReason::Stop,
        }
    }
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Check if model is available
    async fn is_available(&self) -> bool;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn build_request(&self, messages: &[Message]) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(|m| m.into()).collect(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                top_p: Some(self.config.top_p),
                num_predict: Some(self.config.max_tokens as i32),
            }),
            keep_alive: Some(self.config.keep_alive.clone()),
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();
        let request = self.build_request(messages);

        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            // 5xx and 429 are retryable, other 4xx are not
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::Network(format!("Server error {}: {}", status, error)));
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(LlmError::ModelNotFound(self.config.model.clone()));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error)));
        }

        let result: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(GenerationResult {
            text: result.message.content,
            tokens: result.eval_count.unwrap_or(0) as usize,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: if result.done {
                FinishReason::Stop
            } else {
                FinishReason::Length
            },
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.api_url("/tags"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    eval_count: Option<u64>,
}

// =============================================================================
// OpenAI-compatible Backend
// =============================================================================

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API endpoint (OpenAI: https://api.openai.com/v1, or a compatible gateway)
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature (0-2)
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenAIConfig {
    /// Create config for OpenAI
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Create config for a local OpenAI-compatible server (vLLM, LM Studio, etc.)
    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: "not-needed".to_string(),
            model: model.into(),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    /// Create new OpenAI backend
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !config.endpoint.starts_with("http://localhost") {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.endpoint.trim_end_matches('/'))
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();

        let request = OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        };

        let response = self
            .client
            .post(self.chat_url())
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::Network(format!("HTTP {}: {}", status, error_text)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let response: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(GenerationResult {
            text: choice.message.content.clone(),
            tokens: response.usage.map(|u| u.completion_tokens).unwrap_or(0),
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.models_url())
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Role;

    #[test]
    fn test_message_conversion() {
        let msg = Message {
            role: Role::User,
            content: "Hello".to_string(),
        };
        let ollama_msg: OllamaMessage = (&msg).into();
        assert_eq!(ollama_msg.role, "user");
        assert_eq!(ollama_msg.content, "Hello");
    }

    #[test]
    fn test_ollama_request_is_not_streaming() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();
        let request = backend.build_request(&[Message::user("hi")]);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("keep_alive"));
        assert!(json.contains("num_predict"));
    }

    #[test]
    fn test_ollama_api_url_trims_slash() {
        let config = LlmConfig {
            endpoint: "http://ollama:11434/".to_string(),
            ..Default::default()
        };
        let backend = OllamaBackend::new(config).unwrap();
        assert_eq!(backend.api_url("/chat"), "http://ollama:11434/api/chat");
    }

    #[test]
    fn test_ollama_response_parsing() {
        let body = r#"{"message":{"role":"assistant","content":"ok"},"done":true,"eval_count":3}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "ok");
        assert_eq!(parsed.eval_count, Some(3));
    }

    #[test]
    fn test_openai_backend_creation() {
        // Local endpoint should work without API key
        let config = OpenAIConfig::local("http://localhost:8000", "test");
        assert!(OpenAIBackend::new(config).is_ok());

        // Remote endpoint requires API key
        assert!(OpenAIBackend::new(OpenAIConfig::default()).is_err());

        let config = OpenAIConfig::openai("sk-xxx", "gpt-4o");
        assert!(OpenAIBackend::new(config).is_ok());
    }

    #[test]
    fn test_openai_urls() {
        let config = OpenAIConfig::openai("sk-xxx", "gpt-4o");
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(backend.chat_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(backend.models_url(), "https://api.openai.com/v1/models");
        assert_eq!(backend.auth_header(), "Bearer sk-xxx");
    }

    #[test]
    fn test_openai_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hi"},"finish_reason":"length"}],"usage":{"completion_tokens":5}}"#;
        let parsed: OpenAIChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("length"));
        assert_eq!(parsed.usage.map(|u| u.completion_tokens), Some(5));
    }
}
