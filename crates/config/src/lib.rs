//! Configuration management for the stack advisor
//!
//! Supports loading configuration from:
//! - YAML files (config/default.yaml, config/{env}.yaml)
//! - Environment variables (STACK_ADVISOR__ prefix, `__` as separator)
//!
//! The pillar catalog is loaded separately from YAML or CSV, see
//! [`PillarCatalog::load`].

pub mod agent;
pub mod catalog;
pub mod constants;
pub mod settings;

pub use agent::{AgentConfig, LlmConfig, LlmProvider};
pub use catalog::{PillarCatalog, PillarDefinition};
pub use settings::{
    load_settings, load_settings_from, AuthConfig, ObservabilityConfig, PersistenceConfig,
    RuntimeEnvironment, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
