//! `POST /actions/execute_llm` and `POST /actions/concept_set_edit`.

use serde_json::{json, Value};

use super::common::{post, spawn_offline, write_file};

fn concept_set() -> Value {
    json!({"items": [
        {"concept": {"conceptId": 1, "domainId": "Drug", "conceptClassId": "Ingredient"}, "includeDescendants": false}
    ]})
}

#[tokio::test]
async fn e2e_execute_llm_dry_run() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "x.json", &concept_set().to_string());

    let (status, body) = post(
        &base,
        "/actions/execute_llm",
        &json!({
            "artifactRef": path,
            "actions": [
                {"type": "set_include_descendants", "where": {"domainId": "Drug", "conceptClassId": "Ingredient", "includeDescendants": false}, "value": true},
                {"type": "delete_item"}
            ]
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["counts"], json!({"applied": 1, "changed": 1, "ignored": 1}));
    assert_eq!(
        body["preview_changes"],
        json!([{"conceptId": 1, "from": {"includeDescendants": false}, "to": {"includeDescendants": true}}])
    );
    assert_eq!(body["ignored"], json!([{"type": "delete_item", "reason": "unsupported action type"}]));
    assert_eq!(body["applied"], json!(false));
    assert_eq!(body["written_to"], Value::Null);
    assert_eq!(body["artifact"], json!(path));
}

#[tokio::test]
async fn e2e_execute_llm_write_versions_the_file() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "x.json", &concept_set().to_string());

    let (status, body) = post(
        &base,
        "/actions/execute_llm",
        &json!({
            "artifactRef": path,
            "actions": [{"type": "set_include_descendants", "where": {"domainId": "Drug"}}],
            "write": true
        }),
    )
    .await;

    assert_eq!(status, 200);
    let expected = dir.path().join("x-assistant-v1.json");
    assert_eq!(body["written_to"], json!(expected.to_string_lossy()));
    assert_eq!(body["backup_file"], Value::Null);
    let original: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(original, concept_set());
}

#[tokio::test]
async fn e2e_execute_llm_rejects_remote_write() {
    let base = spawn_offline().await;
    let (status, body) = post(
        &base,
        "/actions/execute_llm",
        &json!({
            "artifactRef": "https://example.org/cs.json",
            "actions": [],
            "write": true
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("write only supported to local files"));
}

#[tokio::test]
async fn e2e_execute_llm_rejects_scalar_artifact() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "s.json", "\"just a string\"");
    let (status, body) = post(&base, "/actions/execute_llm", &json!({"artifactRef": path})).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("JSON object or array"));
}

#[tokio::test]
async fn e2e_concept_set_edit_overwrites_in_place() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "cs.json", &concept_set().to_string());

    let (status, body) = post(
        &base,
        "/actions/concept_set_edit",
        &json!({
            "artifactRef": path,
            "ops": [{"op": "set_include_descendants", "where": {"domainId": "Drug", "conceptClassId": "Ingredient"}, "value": true}],
            "write": true
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["written_to"], json!(path));
    assert_eq!(body["backup_file"], Value::Null);
    assert_eq!(body["ops"][0]["op"], json!("set_include_descendants"));
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["items"][0]["includeDescendants"], json!(true));
}
