use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{head_chars, Assistant, Finding, ReviewReport, Severity};
use crate::actions::Action;
use crate::artifact::{canonicalize, load_json, CanonicalItem, Filter};
use crate::error::AssistError;
use crate::prompts::ReviewTool;

/// Items shown to the model.
const PREVIEW_ITEMS: usize = 20;
const INTENT_PLAN_CHARS: usize = 160;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSetReviewRequest {
    pub concept_set_ref: String,
    #[serde(default)]
    pub study_intent: String,
}

/// `set_include_descendants` on Drug/Ingredient items that lack descendants.
pub fn descendants_action() -> Action {
    Action::SetIncludeDescendants {
        filter: Filter {
            domain_id: Some("Drug".into()),
            concept_class_id: Some("Ingredient".into()),
            include_descendants: Some(false),
        },
        value: true,
    }
}

/// Which rules run. The editor bridge skips the domain-mix check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RuleSet {
    Full,
    Editor,
}

/// Rule findings and actions for a canonical item list.
pub fn check_concept_set(items: &[CanonicalItem]) -> (Vec<Value>, Vec<Value>) {
    check_concept_set_with(items, RuleSet::Full)
}

pub(crate) fn check_concept_set_with(
    items: &[CanonicalItem],
    rules: RuleSet,
) -> (Vec<Value>, Vec<Value>) {
    let mut findings = Vec::new();
    let mut actions = Vec::new();

    if items.is_empty() {
        findings.push(Finding::new(
            "empty_concept_set",
            Severity::High,
            "design",
            "Concept set is empty.",
        ));
    }

    let mut seen: BTreeMap<i64, usize> = BTreeMap::new();
    for id in items.iter().filter_map(|i| i.concept_id) {
        *seen.entry(id).or_default() += 1;
    }
    let duplicates: Vec<i64> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id)
        .collect();
    if !duplicates.is_empty() {
        findings.push(Finding::new(
            "duplicate_concepts",
            Severity::Medium,
            "design",
            format!("Duplicate conceptIds: {:?}", duplicates),
        ));
    }

    let domains: BTreeSet<&str> = items
        .iter()
        .filter_map(|i| i.domain_id.as_deref())
        .filter(|d| !d.is_empty())
        .collect();
    if rules == RuleSet::Full && domains.len() > 1 {
        findings.push(Finding::new(
            "mixed_domains",
            Severity::Low,
            "portability",
            format!(
                "Multiple domains detected: {:?}",
                domains.iter().collect::<Vec<_>>()
            ),
        ));
    }

    let lacks_descendants = items.iter().any(|i| {
        i.domain_id.as_deref().is_some_and(|d| d.eq_ignore_ascii_case("drug"))
            && i
                .concept_class_id
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case("ingredient"))
            && !i.descendants_flag()
    });
    if lacks_descendants {
        findings.push(Finding::new(
            "suggest_descendants_concept_set",
            Severity::Medium,
            "design",
            "Drug ingredient concepts missing includeDescendants; consider enabling for coverage.",
        ));
        actions.push(descendants_action().to_value());
    }

    (findings.iter().map(Finding::to_value).collect(), actions)
}

/// User section of the concept-set prompt.
pub(crate) fn concept_set_prompt(study_intent: &str, items: &[CanonicalItem]) -> String {
    let preview: Vec<Value> = items
        .iter()
        .take(PREVIEW_ITEMS)
        .map(|i| {
            json!({
                "conceptId": i.concept_id,
                "domainId": i.domain_id,
                "conceptClassId": i.concept_class_id,
                "includeDescendants": i.descendants_flag(),
            })
        })
        .collect();
    format!(
        "Tool: {}\nStudy intent: {}\nConcept set size: {}\nPreview (first {} items): {}",
        ReviewTool::ConceptSetsReview,
        study_intent,
        items.len(),
        preview.len(),
        Value::Array(preview)
    )
}

impl Assistant {
    /// Reviews a concept set for gaps and inconsistencies.
    pub async fn review_concept_set(
        &self,
        request: &ConceptSetReviewRequest,
    ) -> Result<ReviewReport, AssistError> {
        let concept_set = load_json(&request.concept_set_ref).await?;
        let items = canonicalize(&concept_set);

        let mut report = ReviewReport::new(format!(
            "Review concept set for gaps and inconsistencies given the study intent: {}...",
            head_chars(&request.study_intent, INTENT_PLAN_CHARS)
        ));
        let (findings, actions) = check_concept_set(&items);
        report.findings = findings;
        report.actions = actions;

        let prompt = concept_set_prompt(&request.study_intent, &items);
        if let Some(output) = self.ask(ReviewTool::ConceptSetsReview, &prompt).await {
            report.merge_model_output(&output, false);
        }
        info!(
            concept_set = %request.concept_set_ref,
            items = items.len(),
            findings = report.findings.len(),
            "concept set reviewed"
        );
        Ok(report)
    }
}
