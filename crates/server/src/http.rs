//! HTTP Endpoints
//!
//! REST API for the stack advisor.

use std::time::Duration;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use stack_advisor_agent::messages;
use stack_advisor_core::{ConversationStage, TranscriptEntry};
use stack_advisor_llm::strip_control_tokens;

use crate::auth::{auth_middleware, Caller};
use crate::metrics::metrics_handler;
use crate::orchestrator::TurnStatus;
use crate::state::AppState;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    let request_timeout = Duration::from_secs(config.server.timeout_seconds);
    drop(config);

    Router::new()
        // Conversations
        .route("/api/chats", post(create_chat))
        .route("/api/chat/:session_id", post(chat).get(get_chat))
        .route("/api/chat/:session_id/history", get(chat_history))
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Admin
        .route("/admin/reload-config", post(reload_config))
        // Auth runs after CORS but before handlers
        .layer(axum::middleware::from_fn(auth_middleware))
        .layer(Extension(state.config.clone()))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
}

fn localhost_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(HeaderValue::from_static(DEFAULT_CORS_ORIGIN))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to {}", DEFAULT_CORS_ORIGIN);
        return localhost_cors();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return localhost_cors();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    // Credentials cannot be combined with wildcard headers
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[derive(Debug, Default, Deserialize)]
struct CreateChatRequest {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateChatResponse {
    session_id: String,
    message: &'static str,
}

/// Start a conversation
async fn create_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    request: Option<Json<CreateChatRequest>>,
) -> Result<(StatusCode, Json<CreateChatResponse>), StatusCode> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let session_id = state
        .orchestrator
        .create_session(caller.user_id(request.user_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to create session: {}", e);
            StatusCode::from(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse {
            session_id,
            message: messages::OPENING,
        }),
    ))
}

/// Chat request
#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    user_id: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    response: String,
    stage: Option<ConversationStage>,
    status: TurnStatus,
}

/// One user turn. Failures still answer 200 with user-facing text.
async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let message = strip_control_tokens(&request.message);
    let user_id = caller.user_id(request.user_id);
    let reply = state
        .orchestrator
        .handle_turn(&session_id, user_id.as_deref(), &message)
        .await;

    Json(ChatResponse {
        session_id: reply.session_id,
        response: reply.response,
        stage: reply.stage,
        status: reply.status,
    })
}

/// Session snapshot
async fn get_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session = state
        .orchestrator
        .snapshot(&session_id)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, "Failed to load session: {}", e);
            StatusCode::from(e)
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({
        "session_id": session.session_id,
        "user_id": session.user_id,
        "stage": session.stage,
        "interaction_count": session.interaction_count,
        "initiative": session.initiative,
        "domain": session.domain,
        "current_pillar": session.current_pillar,
        "completed_pillars": session.completed_pillars,
        "pillar_responses": session.pillar_responses,
        "summary_confirmed": session.summary_confirmed,
        "recommended_stack": session.recommended_stack,
    })))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<TranscriptEntry>,
}

/// Recent transcript, oldest first
async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let limit = query
        .limit
        .unwrap_or_else(|| state.orchestrator.history_limit());
    let messages = state
        .store
        .get_transcript(&session_id, limit)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, "Failed to read transcript: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

/// Liveness
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.get_config().environment,
        "active_turns": state.orchestrator.active_sessions(),
    }))
}

/// Readiness: model backend and store both reachable
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut ready = true;

    let llm_ok = state.llm.is_available().await;
    ready &= llm_ok;
    checks.insert(
        "llm_backend".to_string(),
        serde_json::json!({
            "status": if llm_ok { "ok" } else { "unreachable" },
            "model": state.llm.model_name(),
        }),
    );

    let store_status = match state.store.health_check().await {
        Ok(()) => serde_json::json!({ "status": "ok" }),
        Err(e) => {
            ready = false;
            serde_json::json!({ "status": "error", "error": e.to_string() })
        }
    };
    checks.insert("store".to_string(), store_status);

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": checks
        })),
    )
}

/// Reload configuration from disk and environment
async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_config() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "reloaded" })),
        ),
        Err(e) => {
            tracing::error!("Config reload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error", "error": e })),
            )
        }
    }
}
