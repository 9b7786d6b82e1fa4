//! Agent configuration
//!
//! Interview behaviour (catalog location, retry policy, timeouts) and the
//! language model connection used by the stage machine.

use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, interview};

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Assistant name used in the greeting
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Pillar catalog file (.yaml, .yml or .csv)
    #[serde(default = "default_pillar_catalog_path")]
    pub pillar_catalog_path: String,

    /// Domain knowledge document (JSON)
    #[serde(default = "default_domain_knowledge_path")]
    pub domain_knowledge_path: String,

    /// Attempts per model call within one turn
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,

    /// Initial retry backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Whole-turn retries after a persistence conflict
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,

    /// Turn timeout in milliseconds
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,

    /// Transcript entries fed to the model and returned by history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_assistant_name() -> String {
    "AI Solution Architect".to_string()
}
fn default_pillar_catalog_path() -> String {
    interview::PILLAR_CATALOG_PATH.to_string()
}
fn default_domain_knowledge_path() -> String {
    interview::DOMAIN_KNOWLEDGE_PATH.to_string()
}
fn default_generation_attempts() -> u32 {
    interview::GENERATION_ATTEMPTS
}
fn default_initial_backoff_ms() -> u64 {
    interview::INITIAL_BACKOFF_MS
}
fn default_conflict_retries() -> u32 {
    interview::CONFLICT_RETRIES
}
fn default_turn_timeout_ms() -> u64 {
    interview::TURN_TIMEOUT_MS
}
fn default_history_limit() -> usize {
    interview::HISTORY_LIMIT
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            pillar_catalog_path: default_pillar_catalog_path(),
            domain_knowledge_path: default_domain_knowledge_path(),
            generation_attempts: default_generation_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            conflict_retries: default_conflict_retries(),
            turn_timeout_ms: default_turn_timeout_ms(),
            history_limit: default_history_limit(),
            llm: LlmConfig::default(),
        }
    }
}

/// LLM provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama server
    Ollama,
    /// Any OpenAI-compatible chat completions API
    OpenAi,
}

/// LLM connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,

    /// Model name/ID
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API endpoint; empty selects the provider default
    #[serde(default)]
    pub endpoint: String,

    /// API key (for cloud providers)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_llm_provider() -> LlmProvider {
    LlmProvider::Ollama
}
fn default_llm_model() -> String {
    "llama3.1:8b-instruct-q4_K_M".to_string()
}
fn default_max_tokens() -> usize {
    1024
}
fn default_temperature() -> f32 {
    0.2
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

impl LlmConfig {
    /// Configured endpoint, or the provider's default
    pub fn resolved_endpoint(&self) -> &str {
        if !self.endpoint.is_empty() {
            return &self.endpoint;
        }
        match self.provider {
            LlmProvider::Ollama => endpoints::OLLAMA_DEFAULT,
            LlmProvider::OpenAi => endpoints::OPENAI_DEFAULT,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            endpoint: String::new(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
