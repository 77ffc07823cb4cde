//! HTTP/JSON server for the acp tools (axum).
//!
//! Listens on `127.0.0.1:7777` by default. Routes: `GET /health`, `POST /actions/execute_llm`,
//! `POST /actions/concept_set_edit`, `POST /tools/propose_concept_set_diff`,
//! `POST /tools/cohort_lint`, `POST /tools/phenotype_recommendations`,
//! `POST /tools/phenotype_improvements`, `POST /assist/analyze`.
//!
//! Errors are `{"error": "..."}` with status 400 for bad requests and 500 otherwise.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`], [`run_serve_with`].

mod app;
mod handlers;
mod response;

use std::sync::Arc;

use acp::{ActionEngine, Assistant};
use tokio::net::TcpListener;
use tracing::info;

use app::{router, serve_config_from_env, AppState};

pub const DEFAULT_ADDR: &str = "127.0.0.1:7777";
pub const ADDR_ENV: &str = "ACP_ADDR";

pub type ServeError = Box<dyn std::error::Error + Send + Sync>;

/// Serves on an existing listener with an assistant built from the environment.
/// Used by tests (bind to 127.0.0.1:0 then pass the listener).
pub async fn run_serve_on_listener(listener: TcpListener) -> Result<(), ServeError> {
    run_serve_with(listener, Assistant::from_env()).await
}

/// Serves on `listener` with the given assistant.
pub async fn run_serve_with(listener: TcpListener, assistant: Assistant) -> Result<(), ServeError> {
    let addr = listener.local_addr()?;
    info!(
        backends = ?assistant.invoker().backend_names(),
        "acp server listening on http://{}", addr
    );
    let state = Arc::new(AppState {
        assistant: Arc::new(assistant),
        engine: ActionEngine::default(),
    });
    let app = router(state, &serve_config_from_env());
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds `addr`, else `ACP_ADDR`, else [`DEFAULT_ADDR`], and serves until the process ends.
pub async fn run_serve(addr: Option<&str>) -> Result<(), ServeError> {
    let addr = match addr {
        Some(a) => a.to_string(),
        None => std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
    };
    let listener = TcpListener::bind(&addr).await?;
    run_serve_on_listener(listener).await
}
