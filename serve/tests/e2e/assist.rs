//! `POST /assist/analyze`.

use serde_json::json;

use super::common::{post, spawn_offline};

#[tokio::test]
async fn e2e_assist_analyze_prepares_fork_for_webapi() {
    let base = spawn_offline().await;
    let (status, body) = post(
        &base,
        "/assist/analyze",
        &json!({
            "caller": "WebAPI",
            "task": "concept-sets-review",
            "studyIntent": "metformin new users",
            "artifact": {
                "type": "conceptSet",
                "id": 42,
                "name": "Metformin",
                "expression": {"items": [
                    {"concept": {"CONCEPT_ID": 1503297, "DOMAIN_ID": "Drug", "CONCEPT_CLASS_ID": "Ingredient"}, "includeDescendants": false}
                ]}
            }
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["mode"], json!("assist"));
    assert_eq!(body["artifact"], json!({"conceptSetId": 42, "name": "Metformin"}));
    assert_eq!(body["findings"][0]["id"], json!("suggest_descendants_concept_set"));
    let fork = &body["prepared_mutations"][0];
    assert_eq!(fork["apply_policy"], json!("fork"));
    assert_eq!(fork["requests"][1]["url_template"], json!("/WebAPI/conceptset/{newConceptSetId}/expression"));
    assert_eq!(fork["preview_changes"][0]["conceptId"], json!(1503297));
    assert_eq!(body["preimage"]["checksum"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn e2e_assist_analyze_rejects_other_tasks() {
    let base = spawn_offline().await;
    let (status, body) = post(
        &base,
        "/assist/analyze",
        &json!({"task": "cohort-critique-general-design", "artifact": {}}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({"error": "Only concept-sets-review is supported in this prototype"})
    );
}
