//! Review tools: deterministic rule checks, optionally enriched by the model.
//!
//! Every tool follows the same shape: load inputs, run rules, build a prompt, call
//! [`ModelInvoker::invoke`], merge whatever came back. Without a model reply the rule
//! output is returned as-is.

mod assist;
mod cohort;
mod concept_set;
mod phenotype;

pub use assist::{AnalyzeRequest, AnalyzeResponse, PreparedMutation};
pub use cohort::{lint_cohort, CohortLintRequest};
pub use concept_set::{check_concept_set, descendants_action, ConceptSetReviewRequest};
pub use phenotype::{
    cohort_id_from_ref, summarize_cohort, PhenotypeImprovements, PhenotypeImprovementsRequest,
    PhenotypeRecommendations, PhenotypeRecommendationsRequest,
};

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::llm::{ModelConfig, ModelInvoker};
use crate::prompts::{PromptLibrary, ReviewTool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A rule finding. Model findings are kept as raw JSON next to these.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub impact: &'static str,
    pub message: String,
}

impl Finding {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        impact: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            impact,
            message: message.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Output of the concept-set and cohort review tools.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReviewReport {
    pub plan: String,
    pub findings: Vec<Value>,
    pub patches: Vec<Value>,
    pub actions: Vec<Value>,
    pub risk_notes: Vec<Value>,
}

impl ReviewReport {
    pub fn new(plan: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            ..Self::default()
        }
    }

    pub fn finding_ids(&self) -> Vec<&str> {
        self.findings
            .iter()
            .filter_map(|f| f.get("id").and_then(Value::as_str))
            .collect()
    }

    /// Merges a model reply: findings and patches are appended unless an equal entry
    /// exists, an `actions` array replaces the rule actions, and a non-empty `plan`
    /// replaces the plan when `accept_plan` is set.
    pub fn merge_model_output(&mut self, output: &Map<String, Value>, accept_plan: bool) {
        append_unique(&mut self.findings, output.get("findings"));
        append_unique(&mut self.patches, output.get("patches"));
        if let Some(Value::Array(actions)) = output.get("actions") {
            self.actions = actions.clone();
        }
        if accept_plan {
            if let Some(plan) = model_plan(output) {
                self.plan = plan;
            }
        }
    }
}

fn append_unique(target: &mut Vec<Value>, incoming: Option<&Value>) {
    let Some(Value::Array(incoming)) = incoming else {
        return;
    };
    for entry in incoming {
        if !target.contains(entry) {
            target.push(entry.clone());
        }
    }
}

/// Non-empty `plan` string from a model reply.
pub(crate) fn model_plan(output: &Map<String, Value>) -> Option<String> {
    output
        .get("plan")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// `mode` reported by the phenotype and assist tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    Llm,
    Stub,
    Assist,
}

/// Prompt size limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReviewLimits {
    /// Catalog rows shown in the recommendations prompt.
    pub catalog_preview: usize,
    /// Allowed ids listed in the recommendations prompt; `0` lists all.
    pub catalog_allowed_preview: usize,
    /// Characters of cohort JSON excerpt per summary.
    pub cohort_snippet: usize,
    /// Characters per characterization preview.
    pub char_preview_chars: usize,
    pub char_preview_max_files: usize,
}

impl Default for ReviewLimits {
    fn default() -> Self {
        Self {
            catalog_preview: 200,
            catalog_allowed_preview: 400,
            cohort_snippet: 1800,
            char_preview_chars: 1200,
            char_preview_max_files: 2,
        }
    }
}

impl ReviewLimits {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };
        Self {
            catalog_preview: read("ACP_CATALOG_PREVIEW_LIMIT", defaults.catalog_preview),
            catalog_allowed_preview: read(
                "ACP_CATALOG_ALLOWED_PREVIEW_LIMIT",
                defaults.catalog_allowed_preview,
            ),
            cohort_snippet: read("ACP_PHENOTYPE_COHORT_SNIPPET", defaults.cohort_snippet),
            char_preview_chars: read("ACP_CHAR_PREVIEW_CHARS", defaults.char_preview_chars),
            char_preview_max_files: read(
                "ACP_CHAR_PREVIEW_MAX_FILES",
                defaults.char_preview_max_files,
            ),
        }
    }
}

/// Everything the review tools need: model, prompts and limits.
#[derive(Clone, Debug)]
pub struct Assistant {
    invoker: ModelInvoker,
    prompts: Arc<PromptLibrary>,
    limits: ReviewLimits,
}

impl Assistant {
    pub fn new(invoker: ModelInvoker, prompts: Arc<PromptLibrary>, limits: ReviewLimits) -> Self {
        Self {
            invoker,
            prompts,
            limits,
        }
    }

    /// Model, prompts and limits from the process environment.
    pub fn from_env() -> Self {
        Self::new(
            ModelInvoker::from_config(&ModelConfig::from_env()),
            Arc::new(PromptLibrary::from_env()),
            ReviewLimits::from_env(),
        )
    }

    /// Rules only: no model, embedded prompts, default limits.
    pub fn offline() -> Self {
        Self::new(
            ModelInvoker::disabled(),
            Arc::new(PromptLibrary::embedded()),
            ReviewLimits::default(),
        )
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    pub fn limits(&self) -> &ReviewLimits {
        &self.limits
    }

    async fn ask(&self, tool: ReviewTool, user_prompt: &str) -> Option<Map<String, Value>> {
        if !self.invoker.is_enabled() {
            return None;
        }
        let prompt = self.prompts.build(tool, user_prompt);
        self.invoker.invoke(&prompt).await
    }
}

/// First `limit` characters plus a truncation marker; `0` disables truncation.
pub(crate) fn truncate_text(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if limit == 0 || total <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}... [truncated {} chars]", head, total - limit)
}

/// First `limit` characters, no marker.
pub(crate) fn head_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn merge_appends_new_entries_and_replaces_actions() {
        let rule = Finding::new("mixed_domains", Severity::Low, "portability", "x").to_value();
        let mut report = ReviewReport::new("rule plan");
        report.findings.push(rule.clone());
        report.actions.push(json!({"type": "set_include_descendants"}));

        report.merge_model_output(
            &object(json!({
                "findings": [rule, {"id": "model_only"}],
                "patches": [{"op": "note"}, {"op": "note"}],
                "actions": [],
                "plan": "model plan"
            })),
            false,
        );
        assert_eq!(report.finding_ids(), vec!["mixed_domains", "model_only"]);
        assert_eq!(report.patches, vec![json!({"op": "note"})]);
        assert!(report.actions.is_empty());
        assert_eq!(report.plan, "rule plan");
    }

    #[test]
    fn merge_keeps_actions_when_model_sends_none() {
        let mut report = ReviewReport::new("p");
        report.actions.push(json!({"type": "set_include_descendants"}));
        report.merge_model_output(&object(json!({"actions": "bad", "plan": "new"})), true);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.plan, "new");
    }

    #[test]
    fn severity_serializes_lowercase() {
        let f = Finding::new(
            "empty_concept_set",
            Severity::High,
            "design",
            "Concept set is empty.",
        );
        assert_eq!(
            f.to_value(),
            json!({"id": "empty_concept_set", "severity": "high", "impact": "design", "message": "Concept set is empty."})
        );
    }

    #[test]
    fn limits_from_lookup() {
        let limits = ReviewLimits::from_lookup(|key| match key {
            "ACP_CATALOG_PREVIEW_LIMIT" => Some("10".into()),
            "ACP_CHAR_PREVIEW_CHARS" => Some("lots".into()),
            _ => None,
        });
        assert_eq!(limits.catalog_preview, 10);
        assert_eq!(limits.char_preview_chars, 1200);
        assert_eq!(limits.char_preview_max_files, 2);
    }

    #[test]
    fn truncate_marks_dropped_chars() {
        assert_eq!(truncate_text("abcdef", 4), "abcd... [truncated 2 chars]");
        assert_eq!(truncate_text("abc", 4), "abc");
        assert_eq!(truncate_text("abcdef", 0), "abcdef");
        assert_eq!(head_chars("héllo", 2), "hé");
    }
}
