//! Bridge for an external editor (WebAPI): concept-set review plus dry-run prepared
//! mutations the caller may apply itself. Nothing here writes.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::info;

use super::concept_set::concept_set_prompt;
use super::concept_set::{check_concept_set_with, RuleSet};
use super::{descendants_action, head_chars, Assistant, ReviewMode, ReviewReport};
use crate::artifact::{canonicalize, ChangeRecord};
use crate::error::AssistError;
use crate::prompts::ReviewTool;

const WEBAPI_CALLER: &str = "WebAPI";
const CONCEPT_SET_TYPES: [&str; 2] = ["conceptSet", "concept_set"];
const INTENT_PLAN_CHARS: usize = 120;
const FORK_LABEL: &str = "Fork concept set with includeDescendants for Drug/Ingredient";
const FORK_POLICY: &str = "fork";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default, alias = "Tool")]
    pub task: Option<String>,
    #[serde(default)]
    pub artifact: Value,
    #[serde(default, alias = "studyIntent")]
    pub study_intent: Option<String>,
    #[serde(default)]
    pub preimage: Option<Value>,
}

/// A dry-run mutation: HTTP requests the caller can replay against its own API.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PreparedMutation {
    pub label: String,
    pub preimage: Value,
    pub requests: Vec<Value>,
    pub preview_changes: Vec<ChangeRecord>,
    pub apply_policy: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub report: ReviewReport,
    pub prepared_mutations: Vec<PreparedMutation>,
    pub artifact: Value,
    pub preimage: Value,
    pub mode: ReviewMode,
}

impl Assistant {
    /// Reviews an inline concept set (`task: concept-sets-review` only).
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, AssistError> {
        let tool = request.task.as_deref().and_then(|t| t.parse::<ReviewTool>().ok());
        if tool != Some(ReviewTool::ConceptSetsReview) {
            return Err(AssistError::InvalidRequest(
                "Only concept-sets-review is supported in this prototype".into(),
            ));
        }
        let artifact = &request.artifact;
        let is_concept_set = artifact
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| CONCEPT_SET_TYPES.iter().any(|k| *k == t));
        if !artifact.is_object() || !is_concept_set {
            return Err(AssistError::InvalidRequest(
                "artifact.type=conceptSet with expression is required".into(),
            ));
        }
        let expression = match artifact.get("expression") {
            Some(e) if is_truthy(e) => e,
            _ => {
                return Err(AssistError::InvalidRequest(
                    "artifact.expression is required".into(),
                ))
            }
        };
        let concept_set_id = artifact.get("id").cloned().unwrap_or(Value::Null);
        let name = match artifact.get("name").and_then(Value::as_str) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("Concept Set {}", concept_set_id),
        };
        let study_intent = request.study_intent.as_deref().unwrap_or("");

        let items = canonicalize(expression);
        let mut report = ReviewReport::new(format!(
            "Review concept set for includeDescendants gaps (study intent: {}...)",
            head_chars(study_intent, INTENT_PLAN_CHARS)
        ));
        let (findings, actions) = check_concept_set_with(&items, RuleSet::Editor);
        report.findings = findings;
        report.actions = actions;
        let prompt = concept_set_prompt(study_intent, &items);
        if let Some(output) = self.ask(ReviewTool::ConceptSetsReview, &prompt).await {
            report.merge_model_output(&output, true);
        }

        let checksum = request
            .preimage
            .as_ref()
            .and_then(|p| p.get("checksum"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| preimage_checksum(expression));
        let preimage = json!({"conceptSetId": concept_set_id, "checksum": checksum});

        let mut prepared_mutations = Vec::new();
        if request.caller.as_deref() == Some(WEBAPI_CALLER) {
            prepared_mutations.push(fork_mutation(expression, &name, preimage.clone()));
        }
        info!(
            concept_set = %concept_set_id,
            findings = report.findings.len(),
            prepared = prepared_mutations.len(),
            "assist analyze"
        );

        Ok(AnalyzeResponse {
            report,
            prepared_mutations,
            artifact: json!({"conceptSetId": concept_set_id, "name": name}),
            preimage,
            mode: ReviewMode::Assist,
        })
    }
}

/// Forks the concept set with the descendants fix applied to a copy.
fn fork_mutation(expression: &Value, name: &str, preimage: Value) -> PreparedMutation {
    let mut forked = expression.clone();
    let preview_changes = descendants_action().apply(&mut forked);
    PreparedMutation {
        label: FORK_LABEL.to_string(),
        preimage,
        requests: vec![
            json!({
                "method": "POST",
                "url_template": "/WebAPI/conceptset",
                "body": {
                    "name": format!("{} - assistant v1", name),
                    "description": format!("Assistant fork of {}", name),
                }
            }),
            json!({
                "method": "POST",
                "url_template": "/WebAPI/conceptset/{newConceptSetId}/expression",
                "body": forked,
            }),
        ],
        preview_changes,
        apply_policy: FORK_POLICY,
    }
}

/// SHA-256 (hex) of the value serialized with sorted keys, `", "` / `": "` separators
/// and non-ASCII escaped as `\uXXXX`: the layout of Python's
/// `json.dumps(value, sort_keys=True)`, so editors computing the checksum that way agree.
/// Floats in exponent form (`1e16` vs `1e+16`) are the one known divergence.
pub fn preimage_checksum(value: &Value) -> String {
    hex::encode(Sha256::digest(dumps_sorted(value)))
}

fn dumps_sorted(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedAsciiFormatter);
    if sorted_keys(value).serialize(&mut ser).is_err() {
        return value.to_string().into_bytes();
    }
    out
}

struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for c in fragment.chars() {
            if c.is_ascii() && c != '\x7f' {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), sorted_keys(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
