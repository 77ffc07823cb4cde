use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{Assistant, Finding, ReviewReport, Severity};
use crate::artifact::load_json;
use crate::error::AssistError;
use crate::prompts::ReviewTool;

const PLAN: &str = "Review cohort JSON for general design issues (washout/time-at-risk, inverted windows, empty or conflicting criteria).";
const PROPOSED_PRIOR_DAYS: i64 = 365;
/// Top-level cohort keys shown to the model.
const EXCERPT_KEYS: usize = 5;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortLintRequest {
    pub cohort_ref: String,
}

/// Rule findings and patches for a cohort definition.
///
/// - `missing_washout`: no `PrimaryCriteria.ObservationWindow`, or `PriorDays` absent or
///   zero. Comes with a `note` patch proposing 365 days.
/// - `inverted_window_<i>`: inclusion rule `i` has a numeric window with start > end.
///   A missing bound counts as 0.
pub fn lint_cohort(cohort: &Value, cohort_ref: &str) -> (Vec<Value>, Vec<Value>) {
    let mut findings = Vec::new();
    let mut patches = Vec::new();

    let washout = cohort
        .get("PrimaryCriteria")
        .and_then(|pc| pc.get("ObservationWindow"))
        .and_then(Value::as_object)
        .filter(|w| !w.is_empty());
    let prior_days_missing = washout
        .and_then(|w| w.get("PriorDays"))
        .map_or(true, |d| d.is_null() || d.as_f64() == Some(0.0));
    if prior_days_missing {
        findings.push(Finding::new(
            "missing_washout",
            Severity::Medium,
            "validity",
            "No or zero-day washout; consider >= 365 days.",
        ));
        patches.push(json!({
            "artifact": cohort_ref,
            "type": "jsonpatch",
            "ops": [{
                "op": "note",
                "path": "/PrimaryCriteria/ObservationWindow",
                "value": {"ProposedPriorDays": PROPOSED_PRIOR_DAYS}
            }]
        }));
    }

    let rules = cohort
        .get("InclusionRules")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (i, rule) in rules.iter().enumerate() {
        let Some(window) = rule
            .get("window")
            .and_then(Value::as_object)
            .filter(|w| !w.is_empty())
        else {
            continue;
        };
        let bound = |key: &str| match window.get(key) {
            None => Some(0.0),
            Some(v) => v.as_f64(),
        };
        if let (Some(start), Some(end)) = (bound("start"), bound("end")) {
            if start > end {
                findings.push(Finding::new(
                    format!("inverted_window_{}", i),
                    Severity::High,
                    "validity",
                    format!("InclusionRule[{}] has inverted window (start > end).", i),
                ));
            }
        }
    }

    (findings.iter().map(Finding::to_value).collect(), patches)
}

/// User section of the cohort prompt: the first few top-level entries.
pub(crate) fn cohort_prompt(cohort: &Value) -> String {
    let excerpt: Map<String, Value> = cohort
        .as_object()
        .map(|o| {
            o.iter()
                .take(EXCERPT_KEYS)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    format!(
        "Tool: {}\nCohort excerpt: {}",
        ReviewTool::CohortCritique,
        Value::Object(excerpt)
    )
}

impl Assistant {
    /// Lints a cohort definition for general design issues.
    pub async fn lint_cohort(
        &self,
        request: &CohortLintRequest,
    ) -> Result<ReviewReport, AssistError> {
        let cohort = load_json(&request.cohort_ref).await?;
        let mut report = ReviewReport::new(PLAN);
        let (findings, patches) = lint_cohort(&cohort, &request.cohort_ref);
        report.findings = findings;
        report.patches = patches;

        if let Some(output) = self.ask(ReviewTool::CohortCritique, &cohort_prompt(&cohort)).await {
            report.merge_model_output(&output, false);
        }
        info!(cohort = %request.cohort_ref, findings = report.findings.len(), "cohort linted");
        Ok(report)
    }
}
