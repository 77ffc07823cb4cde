//! Axum app: shared state, router and server limits.
//!
//! Every tool is a `POST` with a JSON body; `GET /health` is the only other route.

use std::sync::Arc;

use acp::{ActionEngine, Assistant};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use super::handlers;

/// Server limits read once from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    /// Largest accepted request body in bytes.
    pub(crate) body_limit_bytes: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            body_limit_bytes: 8 * 1024 * 1024,
        }
    }
}

/// `ACP_SERVE_BODY_LIMIT` (bytes, default 8 MiB); unset or invalid values keep the default.
pub(crate) fn serve_config_from_env() -> ServeConfig {
    let default = ServeConfig::default();
    ServeConfig {
        body_limit_bytes: std::env::var("ACP_SERVE_BODY_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.body_limit_bytes),
    }
}

/// Shared by all handlers. The engine's write controller serializes writes per target path
/// across requests.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) assistant: Arc<Assistant>,
    pub(crate) engine: ActionEngine,
}

pub(crate) fn router(state: Arc<AppState>, config: &ServeConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/actions/execute_llm", post(handlers::execute_llm))
        .route("/actions/concept_set_edit", post(handlers::concept_set_edit))
        .route(
            "/tools/propose_concept_set_diff",
            post(handlers::propose_concept_set_diff),
        )
        .route("/tools/cohort_lint", post(handlers::cohort_lint))
        .route(
            "/tools/phenotype_recommendations",
            post(handlers::phenotype_recommendations),
        )
        .route(
            "/tools/phenotype_improvements",
            post(handlers::phenotype_improvements),
        )
        .route("/assist/analyze", post(handlers::assist_analyze))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .with_state(state)
}
