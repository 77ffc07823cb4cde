//! Route handlers: decode the body, call into `acp`, return the result as JSON.

use std::sync::Arc;

use acp::{
    AnalyzeRequest, AnalyzeResponse, CohortLintRequest, ConceptSetEditRequest,
    ConceptSetEditResult, ConceptSetReviewRequest, ExecutionRequest, ExecutionResult,
    PhenotypeImprovements, PhenotypeImprovementsRequest, PhenotypeRecommendations,
    PhenotypeRecommendationsRequest, ReviewReport,
};
use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use tracing::debug;

use super::app::AppState;
use super::response::{parse_body, ApiError};

type JsonResult<T> = Result<Json<T>, ApiError>;

pub(crate) async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub(crate) async fn execute_llm(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<ExecutionResult> {
    let request: ExecutionRequest = parse_body(&body)?;
    debug!(artifact = %request.artifact_ref, write = request.write, "execute_llm");
    Ok(Json(state.engine.execute(request).await?))
}

pub(crate) async fn concept_set_edit(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<ConceptSetEditResult> {
    let request: ConceptSetEditRequest = parse_body(&body)?;
    debug!(artifact = %request.artifact_ref, write = request.write, "concept_set_edit");
    Ok(Json(state.engine.edit_concept_set(request).await?))
}

pub(crate) async fn propose_concept_set_diff(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<ReviewReport> {
    let request: ConceptSetReviewRequest = parse_body(&body)?;
    Ok(Json(state.assistant.review_concept_set(&request).await?))
}

pub(crate) async fn cohort_lint(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<ReviewReport> {
    let request: CohortLintRequest = parse_body(&body)?;
    Ok(Json(state.assistant.lint_cohort(&request).await?))
}

pub(crate) async fn phenotype_recommendations(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<PhenotypeRecommendations> {
    let request: PhenotypeRecommendationsRequest = parse_body(&body)?;
    Ok(Json(state.assistant.recommend_phenotypes(&request).await?))
}

pub(crate) async fn phenotype_improvements(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<PhenotypeImprovements> {
    let request: PhenotypeImprovementsRequest = parse_body(&body)?;
    Ok(Json(state.assistant.improve_phenotypes(&request).await?))
}

pub(crate) async fn assist_analyze(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> JsonResult<AnalyzeResponse> {
    let request: AnalyzeRequest = parse_body(&body)?;
    debug!(caller = ?request.caller, task = ?request.task, "assist_analyze");
    Ok(Json(state.assistant.analyze(&request).await?))
}
