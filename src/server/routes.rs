//! Route handlers and shared server state.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::agent::Orchestrator;
use crate::session::SessionStore;

/// Application name reported by `/health`.
pub const APP_NAME: &str = "ngni-agent";

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    /// Query pipeline.
    pub orchestrator: Arc<Orchestrator>,
    /// Session store.
    pub sessions: Arc<SessionStore>,
}

/// How a query is routed to the specialist agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Routing {
    /// Keyword classification into a fixed branch, then synthesis.
    #[default]
    Deterministic,
    /// The root agent picks specialists through agent tools.
    Llm,
}

/// Body of `POST /query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// The user's question.
    pub query: String,
    /// Session to continue; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Owning user; defaults to `api_user`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Routing mode; defaults to deterministic.
    #[serde(default)]
    pub routing: Routing,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_name: &'static str,
}

/// Error response: status plus `{"detail": ...}`.
pub type ApiError = (StatusCode, Json<Value>);
/// Handler result.
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": message.into() })))
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app_name: APP_NAME,
    })
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Value> {
    let mut session = state
        .sessions
        .get_or_create(request.user_id.as_deref(), request.session_id.as_deref())
        .await;
    info!(
        session = %session.key(),
        routing = ?request.routing,
        "received query"
    );

    let result = match request.routing {
        Routing::Deterministic => state
            .orchestrator
            .query(&mut session, &request.query)
            .await
            .map(|outcome| outcome.response),
        Routing::Llm => state
            .orchestrator
            .query_llm_routed(&mut session, &request.query)
            .await
            .map(|outcome| outcome.to_json()),
    };

    state.sessions.save(session).await;

    result.map(Json).map_err(|e| {
        error!(error = %e, "query failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Builds the axum router over `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .with_state(state)
}
