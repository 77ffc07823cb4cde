//! `GET /health`.

use serde_json::{json, Value};

use super::common::spawn_offline;

#[tokio::test]
async fn e2e_health() {
    let base = spawn_offline().await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}
