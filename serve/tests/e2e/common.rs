//! Shared helpers for e2e tests. Responses are logged with `[e2e] received: ...`;
//! run with `--nocapture` to see them.

use std::path::Path;
use std::sync::Arc;

use acp::llm::ModelBackend;
use acp::{Assistant, MockBackend, ModelInvoker, PromptLibrary, ReviewLimits};
use serde_json::Value;
use tokio::net::TcpListener;

/// Binds a random port and spawns the server with `assistant`. Returns the base URL.
pub async fn spawn_server(assistant: Assistant) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve::run_serve_with(listener, assistant));
    format!("http://{}", addr)
}

/// Server without any model backend.
pub async fn spawn_offline() -> String {
    spawn_server(Assistant::offline()).await
}

/// Server whose model always answers `reply`.
pub async fn spawn_with_reply(reply: &str) -> String {
    let backend: Arc<dyn ModelBackend> = Arc::new(MockBackend::replying(reply));
    let assistant = Assistant::new(
        ModelInvoker::new(vec![backend]),
        Arc::new(PromptLibrary::embedded()),
        ReviewLimits::default(),
    );
    spawn_server(assistant).await
}

/// POSTs `body` (raw text) and returns the status code and parsed JSON reply.
pub async fn post_raw(base: &str, route: &str, body: &str) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(format!("{}{}", base, route))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    let text = res.text().await.unwrap();
    eprintln!("[e2e] received: {} {}", status, text);
    (status, serde_json::from_str(&text).unwrap())
}

pub async fn post(base: &str, route: &str, body: &Value) -> (u16, Value) {
    post_raw(base, route, &body.to_string()).await
}

pub fn write_file(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}
