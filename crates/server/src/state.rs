//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;

use stack_advisor_config::{load_settings, PersistenceConfig, Settings};
use stack_advisor_llm::LlmBackend;
use stack_advisor_persistence::{
    ConversationStore, InMemoryConversationStore, PersistenceError, ScyllaConfig,
};

use crate::orchestrator::TurnOrchestrator;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration wrapped in RwLock for hot-reload support
    pub config: Arc<RwLock<Settings>>,
    /// Runs one user turn at a time per session
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Session and transcript storage (ScyllaDB or in-memory)
    pub store: Arc<dyn ConversationStore>,
    /// Model backend, probed by the readiness check
    pub llm: Arc<dyn LlmBackend>,
    /// Environment name for config reload
    env: Option<String>,
}

impl AppState {
    pub fn new(
        config: Settings,
        orchestrator: Arc<TurnOrchestrator>,
        store: Arc<dyn ConversationStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            orchestrator,
            store,
            llm,
            env: None,
        }
    }

    /// Remember the environment name used for reloads
    pub fn with_env(mut self, env: Option<String>) -> Self {
        self.env = env;
        self
    }

    /// Get a read guard on the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }

    /// Reload configuration from files and environment.
    ///
    /// Authentication settings apply from the next request. Everything else
    /// (bind address, CORS, catalog, model) is fixed at startup.
    pub fn reload_config(&self) -> Result<(), String> {
        let settings = load_settings(self.env.as_deref()).map_err(|e| e.to_string())?;
        *self.config.write() = settings;
        tracing::info!("Configuration reloaded");
        Ok(())
    }
}

/// Open the configured conversation store.
///
/// With persistence enabled, a ScyllaDB failure is returned as is; sessions
/// must survive restarts and be shared between replicas.
pub async fn open_store(
    config: &PersistenceConfig,
) -> Result<Arc<dyn ConversationStore>, PersistenceError> {
    if !config.enabled {
        tracing::info!("Persistence disabled, using in-memory storage");
        return Ok(Arc::new(InMemoryConversationStore::new()));
    }

    tracing::info!("Initializing ScyllaDB persistence layer...");
    match stack_advisor_persistence::init(ScyllaConfig::from(config)).await {
        Ok(store) => {
            tracing::info!(
                hosts = ?config.scylla_hosts,
                keyspace = %config.keyspace,
                "ScyllaDB persistence initialized"
            );
            Ok(Arc::new(store))
        }
        Err(e) => {
            tracing::error!(hosts = ?config.scylla_hosts, "Failed to initialize ScyllaDB: {}", e);
            Err(e)
        }
    }
}
