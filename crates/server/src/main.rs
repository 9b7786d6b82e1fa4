//! Stack Advisor Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use stack_advisor_agent::{DomainKnowledgeStore, StageMachine};
use stack_advisor_config::{load_settings, PillarCatalog, Settings};
use stack_advisor_llm::create_backend;
use stack_advisor_server::{create_router, init_metrics, open_store, AppState, TurnOrchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("STACK_ADVISOR_ENV").ok();
    let config = load_settings(env.as_deref()).map_err(|e| {
        // Tracing not yet initialized
        eprintln!(
            "Invalid configuration (env: {}): {}",
            env.as_deref().unwrap_or("default"),
            e
        );
        e
    })?;

    init_tracing(&config);

    tracing::info!("Starting Stack Advisor Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match init_metrics() {
            Ok(_) => tracing::info!("Initialized Prometheus metrics at /metrics"),
            Err(e) => tracing::warn!("Failed to initialize metrics: {}", e),
        }
    }

    let catalog = PillarCatalog::load(&config.agent.pillar_catalog_path).map_err(|e| {
        tracing::error!(
            path = %config.agent.pillar_catalog_path,
            "Failed to load pillar catalog: {}",
            e
        );
        e
    })?;

    let domains = DomainKnowledgeStore::load(&config.agent.domain_knowledge_path)?;

    let llm = create_backend(&config.agent.llm)?;
    tracing::info!(model = llm.model_name(), "LLM backend configured");

    let store = open_store(&config.persistence).await?;

    let machine = StageMachine::from_config(
        &config.agent,
        Arc::new(catalog),
        Arc::new(domains),
        llm.clone(),
    );
    let orchestrator = Arc::new(TurnOrchestrator::from_config(
        &config.agent,
        Arc::new(machine),
        store.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(config, orchestrator, store, llm).with_env(env);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("stack_advisor={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
