//! Phenotype recommendations (catalog-backed) and improvements (cohort-backed).
//!
//! Both tools only ever return cohort ids from a trusted source: the catalog for
//! recommendations, the supplied cohort definitions for improvements. Anything else the
//! model proposes is reported under `invalid_*` and dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::{head_chars, model_plan, truncate_text, Assistant, ReviewMode};
use crate::artifact::{load_json, load_text, resolve_local_path};
use crate::catalog::{
    clamp_max_results, filter_by_allowlist, filter_by_target, invalid_ids, load_catalog,
    AllowList, Recommendation, COHORT_ID_FIELD, TARGET_COHORT_ID_FIELD,
};
use crate::error::AssistError;
use crate::prompts::ReviewTool;

const DEFAULT_MAX_RESULTS: i64 = 5;
const PROTOCOL_PROMPT_CHARS: usize = 2000;
const DESCRIPTION_CHARS: usize = 240;
const SUMMARY_RULE_NAMES: usize = 3;
const SUMMARY_CONCEPT_SETS: usize = 5;
/// Extra bytes read past the preview limit so truncation can be reported.
const PREVIEW_SLACK_BYTES: usize = 1024;

const RECOMMENDATIONS_PLAN: &str =
    "Suggest relevant phenotypes from catalog for the study intent (stub if no LLM).";
const IMPROVEMENTS_PLAN: &str =
    "Review selected phenotypes for improvements against study intent (stub if no LLM).";
const STUB_JUSTIFICATION: &str = "Stub recommendation from deterministic fallback (no LLM).";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhenotypeRecommendationsRequest {
    pub protocol_ref: Option<String>,
    pub cohorts_catalog_ref: Option<String>,
    pub max_results: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total_rows: usize,
    pub preview_rows: usize,
    pub allowed_ids: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhenotypeRecommendations {
    pub plan: String,
    pub phenotype_recommendations: Vec<Recommendation>,
    pub mode: ReviewMode,
    pub artifact: Value,
    pub catalog_stats: CatalogStats,
    pub invalid_ids_filtered: Vec<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhenotypeImprovementsRequest {
    pub protocol_ref: Option<String>,
    pub cohort_refs: Option<Vec<String>>,
    pub characterization_refs: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhenotypeImprovements {
    pub plan: String,
    pub phenotype_improvements: Vec<Value>,
    pub code_suggestion: Value,
    pub mode: ReviewMode,
    pub invalid_targets_filtered: Vec<Value>,
    pub artifact: Value,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Assistant {
    /// Recommends catalog phenotypes for a protocol. Falls back to the first catalog
    /// entries (`mode: "stub"`) when the model gives no usable list.
    pub async fn recommend_phenotypes(
        &self,
        request: &PhenotypeRecommendationsRequest,
    ) -> Result<PhenotypeRecommendations, AssistError> {
        let (Some(protocol_ref), Some(catalog_ref)) =
            (required(&request.protocol_ref), required(&request.cohorts_catalog_ref))
        else {
            return Err(AssistError::InvalidRequest(
                "protocolRef and cohortsCatalogRef are required".into(),
            ));
        };

        let protocol = load_text(protocol_ref).await?;
        let catalog = load_catalog(catalog_ref).await?;
        if catalog.is_empty() {
            return Err(AssistError::InvalidRequest(
                "cohortsCatalogRef resolved to an empty catalog".into(),
            ));
        }
        let allow = AllowList::from_entries(&catalog);
        if allow.is_empty() {
            return Err(AssistError::InvalidRequest(
                "No cohortIds found in cohorts catalog".into(),
            ));
        }
        let max_results =
            clamp_max_results(request.max_results.unwrap_or(DEFAULT_MAX_RESULTS), &allow);

        let preview = &catalog[..catalog.len().min(self.limits.catalog_preview)];
        let mut shown_ids: Vec<Value> = allow.ids().map(Value::from).collect();
        let limit = self.limits.catalog_allowed_preview;
        if limit > 0 && shown_ids.len() > limit {
            let hidden = shown_ids.len() - limit;
            shown_ids.truncate(limit);
            shown_ids.push(Value::from(format!("... (+{} more ids not shown)", hidden)));
        }
        let shown_count = allow.len().min(if limit == 0 { allow.len() } else { limit });
        let user_prompt = format!(
            "Tool: {tool}\nmaxResults: {max_results}\nAllowed cohortIds (total {total}, showing up to {shown_count}): {ids}\nStudy intent (truncated): {intent}\nCatalog preview (first {preview_len} of {rows} rows): {preview_json}",
            tool = ReviewTool::PhenotypeRecommendations,
            total = allow.len(),
            ids = Value::Array(shown_ids),
            intent = head_chars(&protocol, PROTOCOL_PROMPT_CHARS),
            preview_len = preview.len(),
            rows = catalog.len(),
            preview_json = serde_json::to_string(preview)?,
        );

        let mut plan = RECOMMENDATIONS_PLAN.to_string();
        let mut invalid = Vec::new();
        let output = self.ask(ReviewTool::PhenotypeRecommendations, &user_prompt).await;
        let model_records = output.as_ref().and_then(|o| match o.get("phenotype_recommendations") {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        });
        let (mode, recommendations) = match (output.as_ref(), model_records) {
            (Some(output), Some(records)) => {
                invalid = invalid_ids(records, &allow, COHORT_ID_FIELD);
                if let Some(p) = model_plan(output) {
                    plan = p;
                }
                (ReviewMode::Llm, filter_by_allowlist(records, &allow, max_results))
            }
            _ => (ReviewMode::Stub, stub_recommendations(&allow, max_results)),
        };
        info!(
            catalog = catalog_ref,
            mode = ?mode,
            returned = recommendations.len(),
            rejected = invalid.len(),
            "phenotype recommendations"
        );

        Ok(PhenotypeRecommendations {
            plan,
            phenotype_recommendations: recommendations,
            mode,
            artifact: json!({"protocolRef": protocol_ref, "cohortsCatalogRef": catalog_ref}),
            catalog_stats: CatalogStats {
                total_rows: catalog.len(),
                preview_rows: preview.len(),
                allowed_ids: allow.len(),
            },
            invalid_ids_filtered: invalid,
        })
    }

    /// Suggests improvements to the supplied cohort definitions. Only improvements
    /// targeting one of those cohorts are returned.
    pub async fn improve_phenotypes(
        &self,
        request: &PhenotypeImprovementsRequest,
    ) -> Result<PhenotypeImprovements, AssistError> {
        let cohort_refs = request.cohort_refs.clone().unwrap_or_default();
        let characterization_refs = request.characterization_refs.clone().unwrap_or_default();
        debug!(
            protocol = ?request.protocol_ref,
            cohorts = ?cohort_refs,
            characterizations = ?characterization_refs,
            "phenotype improvements request"
        );
        let Some(protocol_ref) = required(&request.protocol_ref).filter(|_| !cohort_refs.is_empty())
        else {
            return Err(AssistError::InvalidRequest(
                "protocolRef and cohortRefs[] are required".into(),
            ));
        };

        let protocol = load_text(protocol_ref).await?;
        let mut cohorts = Vec::with_capacity(cohort_refs.len());
        for reference in &cohort_refs {
            let cohort = load_json(reference).await.map_err(|e| {
                AssistError::InvalidRequest(format!("failed to load cohort {}: {}", reference, e))
            })?;
            cohorts.push((reference.as_str(), cohort));
        }

        let allow = AllowList::from_ids(cohorts.iter().filter_map(|(r, c)| cohort_id(c, r)));
        if allow.is_empty() {
            return Err(AssistError::InvalidRequest(
                "No cohortIds found; include an 'id' in the cohort JSON or encode it in the filename (e.g., 33_name.json).".into(),
            ));
        }

        let summaries: Vec<Value> = cohorts
            .iter()
            .map(|(r, c)| summarize_cohort(c, r, self.limits.cohort_snippet))
            .collect();
        let previews = characterization_previews(
            &characterization_refs,
            self.limits.char_preview_max_files,
            self.limits.char_preview_chars,
        )
        .await;
        let allowed_ids: Vec<i64> = allow.ids().collect();
        let user_prompt = format!(
            "Tool: {}\nAllowed cohortIds: {:?}\nStudy intent (truncated): {}\nPhenotype summaries (truncated content): {}\nCharacterization previews (limited to {} files, {} chars each): {}",
            ReviewTool::PhenotypeImprovements,
            allowed_ids,
            head_chars(&protocol, PROTOCOL_PROMPT_CHARS),
            Value::Array(summaries),
            self.limits.char_preview_max_files,
            self.limits.char_preview_chars,
            Value::Array(previews),
        );

        let mut plan = IMPROVEMENTS_PLAN.to_string();
        let mut improvements = Vec::new();
        let mut invalid = Vec::new();
        let mut code_suggestion = Value::Null;
        let mode = match self.ask(ReviewTool::PhenotypeImprovements, &user_prompt).await {
            Some(output) => {
                let records = output
                    .get("phenotype_improvements")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                invalid = invalid_ids(records, &allow, TARGET_COHORT_ID_FIELD);
                improvements = filter_by_target(records, &allow, TARGET_COHORT_ID_FIELD);
                code_suggestion = output.get("code_suggestion").cloned().unwrap_or(Value::Null);
                if let Some(p) = model_plan(&output) {
                    plan = p;
                }
                ReviewMode::Llm
            }
            None => ReviewMode::Stub,
        };
        info!(
            cohorts = cohort_refs.len(),
            mode = ?mode,
            returned = improvements.len(),
            rejected = invalid.len(),
            "phenotype improvements"
        );

        Ok(PhenotypeImprovements {
            plan,
            phenotype_improvements: improvements,
            code_suggestion,
            mode,
            invalid_targets_filtered: invalid,
            artifact: json!({
                "protocolRef": protocol_ref,
                "cohortRefs": cohort_refs,
                "characterizationRefs": characterization_refs,
            }),
        })
    }
}

fn stub_recommendations(allow: &AllowList, max_results: usize) -> Vec<Recommendation> {
    allow
        .entries()
        .iter()
        .take(max_results)
        .map(|e| Recommendation {
            cohort_id: e.cohort_id,
            cohort_name: e.cohort_name.clone(),
            justification: STUB_JUSTIFICATION.to_string(),
            confidence: None,
        })
        .collect()
}

/// Cohort id from the definition's `id`, else from the file name.
fn cohort_id(cohort: &Value, reference: &str) -> Option<i64> {
    match cohort.get("id") {
        None | Some(Value::Null) => cohort_id_from_ref(reference),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(_) => None,
    }
}

/// First run of digits in the file name, e.g. `33` for `cohorts/33_asthma.json`.
pub fn cohort_id_from_ref(reference: &str) -> Option<i64> {
    let base = Path::new(reference).file_name()?.to_str()?;
    let digits: String = base
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Compact cohort summary for prompting: never the full definition.
pub fn summarize_cohort(cohort: &Value, reference: &str, snippet_limit: usize) -> Value {
    let id = match cohort.get("id") {
        None | Some(Value::Null) => cohort_id_from_ref(reference)
            .map(Value::from)
            .unwrap_or(Value::Null),
        Some(v) => v.clone(),
    };
    let washout_days = cohort
        .get("PrimaryCriteria")
        .and_then(|pc| pc.get("ObservationWindow"))
        .and_then(|w| w.get("PriorDays"))
        .cloned()
        .unwrap_or(Value::Null);
    let rules = cohort
        .get("InclusionRules")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let rule_names: Vec<String> = rules
        .iter()
        .take(SUMMARY_RULE_NAMES)
        .enumerate()
        .map(|(i, r)| match first_str(r, &["name", "Name"]) {
            "" => format!("Rule {}", i),
            name => name.to_string(),
        })
        .collect();
    let concept_sets: Vec<Value> = ["ConceptSets", "conceptSets"]
        .iter()
        .find_map(|k| cohort.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .take(SUMMARY_CONCEPT_SETS)
        .filter(|cs| cs.is_object())
        .map(|cs| {
            let items = cs
                .get("items")
                .and_then(Value::as_array)
                .filter(|i| !i.is_empty())
                .or_else(|| {
                    cs.get("expression")
                        .and_then(|e| e.get("items"))
                        .and_then(Value::as_array)
                })
                .map_or(0, Vec::len);
            let name = ["name", "Name"]
                .iter()
                .find_map(|k| cs.get(*k).filter(|v| !v.is_null()))
                .cloned()
                .unwrap_or(Value::Null);
            json!({"id": cs.get("id").cloned().unwrap_or(Value::Null), "name": name, "items": items})
        })
        .collect();

    json!({
        "ref": reference,
        "cohortId": id,
        "name": first_str(cohort, &["name", "Name"]),
        "description": truncate_text(first_str(cohort, &["description", "Description"]), DESCRIPTION_CHARS),
        "washoutDays": washout_days,
        "inclusionRuleCount": rules.len(),
        "inclusionRuleNames": rule_names,
        "conceptSets": concept_sets,
        "excerpt": truncate_text(&cohort.to_string(), snippet_limit),
    })
}

/// Text previews of the first `max_files` local files. Binary files (containing NUL)
/// and unreadable files produce an `error` entry instead.
async fn characterization_previews(
    refs: &[String],
    max_files: usize,
    char_limit: usize,
) -> Vec<Value> {
    let mut previews = Vec::new();
    for reference in refs.iter().take(max_files) {
        let path = resolve_local_path(reference);
        let entry = match read_head(&path, char_limit + PREVIEW_SLACK_BYTES).await {
            Err(e) => json!({"ref": reference, "error": e.to_string()}),
            Ok(raw) if raw.contains(&0) => {
                json!({"ref": reference, "error": "binary file not previewed"})
            }
            Ok(raw) => {
                let text = String::from_utf8_lossy(&raw);
                let preview = if char_limit > 0 && raw.len() > char_limit {
                    format!(
                        "{}... [truncated {} bytes]",
                        head_chars(&text, char_limit),
                        raw.len() - char_limit
                    )
                } else {
                    text.into_owned()
                };
                json!({"ref": reference, "preview": preview})
            }
        };
        previews.push(entry);
    }
    previews
}

async fn read_head(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::new();
    file.take(limit as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}
