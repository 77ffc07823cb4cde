//! Declarative actions proposed by rules or by the model.
//!
//! Raw action descriptors are untrusted JSON. [`parse_action`] turns one into a typed
//! [`Action`] or an [`IgnoredAction`] with a reason; nothing here ever fails a batch.

mod engine;

pub use engine::{
    ActionEngine, ConceptSetEditRequest, ConceptSetEditResult, ExecutionCounts,
    ExecutionRequest, ExecutionResult, ExecutionStage,
};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::artifact::{apply_set_include_descendants, ChangeRecord, Filter};

pub const SET_INCLUDE_DESCENDANTS: &str = "set_include_descendants";

pub const REASON_UNSUPPORTED: &str = "unsupported action type";
pub const REASON_NO_MATCH: &str = "no items matched filter";
pub const REASON_INVALID_VALUE: &str = "invalid action value";
pub const REASON_INVALID_FILTER: &str = "invalid filter";
pub const REASON_MALFORMED: &str = "action must be an object";

/// A validated action. Only one mutation primitive exists.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SetIncludeDescendants {
        #[serde(rename = "where")]
        filter: Filter,
        value: bool,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetIncludeDescendants { .. } => SET_INCLUDE_DESCENDANTS,
        }
    }

    /// Applies the action in place and returns one record per matched item.
    pub fn apply(&self, artifact: &mut Value) -> Vec<ChangeRecord> {
        match self {
            Self::SetIncludeDescendants { filter, value } => {
                apply_set_include_descendants(artifact, filter, *value)
            }
        }
    }

    /// Raw descriptor form, as rules emit it alongside model actions.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// An action that was not applied, with the reason.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IgnoredAction {
    #[serde(rename = "type")]
    pub action_type: Value,
    pub reason: String,
}

impl IgnoredAction {
    fn new(action_type: Value, reason: &str) -> Self {
        Self {
            action_type,
            reason: reason.to_string(),
        }
    }
}

/// Validates one raw descriptor.
///
/// The type is read from `type`, falling back to `op`. `where` keys outside
/// [`Filter::FIELDS`] are stripped; a missing `value` means `true`.
pub fn parse_action(raw: &Value) -> Result<Action, IgnoredAction> {
    let Some(fields) = raw.as_object() else {
        return Err(IgnoredAction::new(Value::Null, REASON_MALFORMED));
    };
    let action_type = ["type", "op"]
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|v| !v.is_null() && v.as_str() != Some(""))
        .cloned()
        .unwrap_or(Value::Null);
    if action_type.as_str() != Some(SET_INCLUDE_DESCENDANTS) {
        return Err(IgnoredAction::new(action_type, REASON_UNSUPPORTED));
    }

    let filter = match fields.get("where") {
        None | Some(Value::Null) => Filter::default(),
        Some(Value::Object(filter)) => sanitize_filter(filter)
            .ok_or_else(|| IgnoredAction::new(action_type.clone(), REASON_INVALID_FILTER))?,
        Some(_) => return Err(IgnoredAction::new(action_type, REASON_INVALID_FILTER)),
    };
    let value = match fields.get("value") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(IgnoredAction::new(action_type, REASON_INVALID_VALUE)),
    };
    Ok(Action::SetIncludeDescendants { filter, value })
}

/// Keeps only declared filter keys. `None` when a kept key has the wrong JSON type.
pub fn sanitize_filter(raw: &Map<String, Value>) -> Option<Filter> {
    let stripped: Vec<&String> = raw
        .keys()
        .filter(|k| !Filter::FIELDS.iter().any(|f| f == k))
        .collect();
    if !stripped.is_empty() {
        debug!(keys = ?stripped, "stripping undeclared filter keys");
    }
    let text = |key: &str| match raw.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => None,
    };
    let include_descendants = match raw.get("includeDescendants") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => return None,
    };
    Some(Filter {
        domain_id: text("domainId")?,
        concept_class_id: text("conceptClassId")?,
        include_descendants,
    })
}

/// Outcome of applying a batch of raw actions to one artifact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// Actions that affected at least one item.
    pub applied: usize,
    pub preview_changes: Vec<ChangeRecord>,
    pub ignored: Vec<IgnoredAction>,
}

/// Validates and applies each raw action in order. Unsupported, invalid and non-matching
/// actions become ignored entries; the batch always completes.
pub fn apply_actions(artifact: &mut Value, actions: &[Value]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for raw in actions {
        let action = match parse_action(raw) {
            Ok(action) => action,
            Err(ignored) => {
                debug!(
                    action_type = %ignored.action_type,
                    reason = %ignored.reason,
                    "action ignored"
                );
                report.ignored.push(ignored);
                continue;
            }
        };
        let changes = action.apply(artifact);
        if changes.is_empty() {
            report.ignored.push(IgnoredAction::new(
                Value::from(action.kind()),
                REASON_NO_MATCH,
            ));
        } else {
            report.applied += 1;
            report.preview_changes.extend(changes);
        }
    }
    report
}
