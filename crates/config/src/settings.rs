//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{AgentConfig, ConfigError};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Interview agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Persistence configuration (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    /// ScyllaDB host addresses
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    /// ScyllaDB keyspace name
    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    /// ScyllaDB replication factor
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "stack_advisor".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Disabled by default for development
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_agent()?;
        self.validate_persistence()?;
        Ok(())
    }

    fn validate_agent(&self) -> Result<(), ConfigError> {
        let agent = &self.agent;

        if agent.generation_attempts == 0 || agent.generation_attempts > 10 {
            return Err(ConfigError::InvalidValue {
                field: "agent.generation_attempts".to_string(),
                message: format!("Must be between 1 and 10, got {}", agent.generation_attempts),
            });
        }

        if agent.turn_timeout_ms < 1000 {
            return Err(ConfigError::InvalidValue {
                field: "agent.turn_timeout_ms".to_string(),
                message: "Turn timeout too low (minimum 1000ms)".to_string(),
            });
        }

        if agent.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.history_limit".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if agent.pillar_catalog_path.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "agent.pillar_catalog_path".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&agent.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "agent.llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", agent.llm.temperature),
            });
        }

        if agent.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("agent.llm.model".to_string()));
        }

        if self.environment.is_strict()
            && agent.llm.provider == crate::LlmProvider::OpenAi
            && agent.llm.api_key.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "agent.llm.api_key".to_string(),
                message: "API key must be set for the openai provider".to_string(),
            });
        }

        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        let persistence = &self.persistence;
        if persistence.enabled && persistence.scylla_hosts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "persistence.scylla_hosts".to_string(),
                message: "At least one host is required when persistence is enabled".to_string(),
            });
        }
        if persistence.replication_factor == 0 {
            return Err(ConfigError::InvalidValue {
                field: "persistence.replication_factor".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        if self.environment.is_production() && !persistence.enabled {
            tracing::warn!("Persistence is disabled in production; sessions will not survive a restart");
        }
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if let Some((user, _)) = server.auth.user_keys.iter().find(|(_, key)| key.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: format!("server.auth.user_keys.{}", user),
                message: "API key cannot be empty".to_string(),
            });
        }

        // Auth validation in production
        if self.environment.is_production() && server.auth.enabled && !server.auth.has_keys() {
            return Err(ConfigError::InvalidValue {
                field: "server.auth.api_key".to_string(),
                message: "API key must be set when auth is enabled in production".to_string(),
            });
        }

        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// API key authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Enable authentication (set to false for development)
    #[serde(default)]
    pub enabled: bool,

    /// API key (should be set via STACK_ADVISOR__SERVER__AUTH__API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-user keys, user id to key. Requests made with one of these act
    /// as that user.
    #[serde(default)]
    pub user_keys: BTreeMap<String, String>,

    /// Exact paths that bypass authentication (e.g., health checks)
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl AuthConfig {
    /// True when at least one non-empty key is configured
    pub fn has_keys(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
            || self.user_keys.values().any(|key| !key.is_empty())
    }
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Disabled by default for development
            api_key: None,
            user_keys: BTreeMap::new(),
            public_paths: default_public_paths(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    150
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (STACK_ADVISOR__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Same as [`load_settings`], reading YAML files from `dir`
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::from(dir.join("default")).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("STACK_ADVISOR")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    // Validate
    settings.validate()?;

    Ok(settings)
}
