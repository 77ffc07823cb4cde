//! Malformed bodies and missing fields come back as 400 `{"error": ...}`.

use serde_json::json;

use super::common::{post, post_raw, spawn_offline};

#[tokio::test]
async fn e2e_malformed_json_is_400() {
    let base = spawn_offline().await;
    let (status, body) = post_raw(&base, "/actions/execute_llm", "{not json").await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("invalid JSON body"));
}

#[tokio::test]
async fn e2e_actions_must_be_a_list() {
    let base = spawn_offline().await;
    let (status, body) = post(
        &base,
        "/actions/execute_llm",
        &json!({"artifactRef": "x.json", "actions": {"type": "set_include_descendants"}}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "actions must be a list"}));
}

#[tokio::test]
async fn e2e_missing_ref_is_400() {
    let base = spawn_offline().await;
    let (status, body) = post_raw(&base, "/tools/cohort_lint", "").await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("cohortRef"));
}

#[tokio::test]
async fn e2e_unreadable_artifact_is_400() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let (status, body) = post(
        &base,
        "/tools/cohort_lint",
        &json!({"cohortRef": missing.to_string_lossy()}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("failed to load"));
}
