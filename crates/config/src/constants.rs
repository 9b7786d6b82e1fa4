//! Centralized constants for the stack advisor
//!
//! Default values shared by the settings structs and the crates that consume
//! them.

/// Service endpoints
pub mod endpoints {
    /// Default Ollama server
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Default OpenAI-compatible API base
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
}

/// Interview defaults
pub mod interview {
    /// Attempts for a single model call before giving up on the turn
    pub const GENERATION_ATTEMPTS: u32 = 3;

    /// First backoff delay; doubled after each failed attempt
    pub const INITIAL_BACKOFF_MS: u64 = 1000;

    /// Whole-turn retries after a version conflict
    pub const CONFLICT_RETRIES: u32 = 3;

    /// Upper bound for one turn, model calls included
    pub const TURN_TIMEOUT_MS: u64 = 120_000;

    /// Transcript window used for history and model context
    pub const HISTORY_LIMIT: usize = 48;

    pub const PILLAR_CATALOG_PATH: &str = "config/pillars.yaml";

    pub const DOMAIN_KNOWLEDGE_PATH: &str = "data/domain_knowledge.json";
}
