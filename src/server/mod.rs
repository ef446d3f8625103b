//! HTTP query endpoint.
//!
//! Exposes the orchestrator over axum:
//!
//! ```text
//! POST /query  { query, session_id?, user_id?, routing? }
//!   ↓ SessionStore::get_or_create
//! Orchestrator::query | Orchestrator::query_llm_routed
//!   ↓ SessionStore::save
//! ranking JSON | { "response": ... } | 500 { "detail": ... }
//!
//! GET /health  { "status": "ok", "app_name": ... }
//! ```
//!
//! # Feature Gate
//!
//! This module requires the `server` feature flag (enabled by default).

pub mod routes;
pub mod transport;

pub use routes::{AppState, QueryRequest, Routing, build_router};
pub use transport::serve;
