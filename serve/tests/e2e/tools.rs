//! Review tool routes.

use serde_json::json;

use super::common::{post, spawn_offline, spawn_with_reply, write_file};

const CATALOG: &str = "cohortId,cohortName,logicDescription\n1,Asthma,Two codes\n2,COPD,One code\n";

#[tokio::test]
async fn e2e_propose_concept_set_diff() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "cs.json", "{\"items\": []}");

    let (status, body) = post(
        &base,
        "/tools/propose_concept_set_diff",
        &json!({"conceptSetRef": path, "studyIntent": "asthma"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["findings"][0]["id"], json!("empty_concept_set"));
    assert_eq!(body["actions"], json!([]));
    assert_eq!(body["risk_notes"], json!([]));
    assert!(body["plan"].as_str().unwrap().contains("asthma"));
}

#[tokio::test]
async fn e2e_cohort_lint() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "c.json",
        &json!({
            "PrimaryCriteria": {"ObservationWindow": {"PriorDays": 365}},
            "InclusionRules": [{"window": {"start": 30, "end": 0}}]
        })
        .to_string(),
    );
    let (status, body) = post(&base, "/tools/cohort_lint", &json!({"cohortRef": path})).await;
    assert_eq!(status, 200);
    assert_eq!(body["findings"][0]["id"], json!("inverted_window_0"));
    assert_eq!(body["patches"], json!([]));
}

#[tokio::test]
async fn e2e_phenotype_recommendations_llm_filters_ids() {
    let reply = json!({
        "phenotype_recommendations": [
            {"cohortId": 7, "justification": "made up"},
            {"cohortId": 2, "justification": "COPD overlap"}
        ]
    })
    .to_string();
    let base = spawn_with_reply(&reply).await;
    let dir = tempfile::tempdir().unwrap();
    let body = json!({
        "protocolRef": write_file(dir.path(), "protocol.md", "adults with asthma"),
        "cohortsCatalogRef": write_file(dir.path(), "Cohorts.csv", CATALOG),
        "maxResults": 3
    });

    let (status, body) = post(&base, "/tools/phenotype_recommendations", &body).await;
    assert_eq!(status, 200);
    assert_eq!(body["mode"], json!("llm"));
    assert_eq!(
        body["phenotype_recommendations"],
        json!([{"cohortId": 2, "cohortName": "COPD", "justification": "COPD overlap", "confidence": null}])
    );
    assert_eq!(body["invalid_ids_filtered"], json!([7]));
    assert_eq!(body["catalog_stats"]["total_rows"], json!(2));
}

#[tokio::test]
async fn e2e_phenotype_recommendations_requires_refs() {
    let base = spawn_offline().await;
    let (status, body) = post(&base, "/tools/phenotype_recommendations", &json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({"error": "protocolRef and cohortsCatalogRef are required"})
    );
}

#[tokio::test]
async fn e2e_phenotype_improvements_stub() {
    let base = spawn_offline().await;
    let dir = tempfile::tempdir().unwrap();
    let body = json!({
        "protocolRef": write_file(dir.path(), "protocol.md", "adults with asthma"),
        "cohortRefs": [write_file(dir.path(), "12_asthma.json", "{\"name\": \"Asthma\"}")],
        "characterizationRefs": [write_file(dir.path(), "chars.csv", "covariate,mean\nage,54\n")]
    });

    let (status, body) = post(&base, "/tools/phenotype_improvements", &body).await;
    assert_eq!(status, 200);
    assert_eq!(body["mode"], json!("stub"));
    assert_eq!(body["phenotype_improvements"], json!([]));
    assert_eq!(body["code_suggestion"], json!(null));
    assert_eq!(body["artifact"]["cohortRefs"].as_array().unwrap().len(), 1);
}
