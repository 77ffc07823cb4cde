//! Canonical item view over concept-set structures.
//!
//! Source artifacts come in two shapes (a container with an `items` array, or a bare
//! array) and name their concept fields in camelCase or UPPER_SNAKE_CASE. The decode
//! here is a tagged match on the shape plus a fixed alias list per field, camelCase first.

use serde::Serialize;
use serde_json::{Map, Value};

/// Alias lists in priority order. The first non-null alias wins.
const CONCEPT_ID_KEYS: &[&str] = &["conceptId", "CONCEPT_ID"];
const DOMAIN_ID_KEYS: &[&str] = &["domainId", "DOMAIN_ID"];
const CONCEPT_CLASS_ID_KEYS: &[&str] = &["conceptClassId", "CONCEPT_CLASS_ID"];

const CONCEPT_KEY: &str = "concept";
pub(crate) const INCLUDE_DESCENDANTS_KEY: &str = "includeDescendants";
const ITEMS_KEY: &str = "items";

/// Position of an item in the source item list.
///
/// Resolved once by [`canonicalize`]; the same structure always yields the same handle
/// for the same element, so a handle can be used for a single write-back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemHandle(usize);

impl ItemHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Uniform view of one concept-set item.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub concept_id: Option<i64>,
    pub domain_id: Option<String>,
    pub concept_class_id: Option<String>,
    pub include_descendants: Option<bool>,
    #[serde(skip)]
    pub handle: ItemHandle,
}

impl CanonicalItem {
    /// `includeDescendants` with missing/null read as `false`.
    pub fn descendants_flag(&self) -> bool {
        self.include_descendants.unwrap_or(false)
    }
}

enum Shape<'a> {
    Container(&'a [Value]),
    Sequence(&'a [Value]),
    Unrecognized,
}

fn shape(artifact: &Value) -> Shape<'_> {
    match artifact {
        Value::Object(map) if map.contains_key(ITEMS_KEY) => match map.get(ITEMS_KEY) {
            Some(Value::Array(items)) => Shape::Container(items),
            _ => Shape::Unrecognized,
        },
        Value::Array(items) => Shape::Sequence(items),
        _ => Shape::Unrecognized,
    }
}

/// The source item list, or an empty slice when the artifact has no recognizable items.
pub fn source_items(artifact: &Value) -> &[Value] {
    match shape(artifact) {
        Shape::Container(items) | Shape::Sequence(items) => items,
        Shape::Unrecognized => &[],
    }
}

pub(crate) fn source_items_mut(artifact: &mut Value) -> Option<&mut Vec<Value>> {
    match artifact {
        Value::Object(map) => map.get_mut(ITEMS_KEY).and_then(Value::as_array_mut),
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Projects the artifact's items into canonical form, one entry per source item, in order.
///
/// Unrecognized shapes yield an empty list; that is a valid "nothing to review" state.
pub fn canonicalize(artifact: &Value) -> Vec<CanonicalItem> {
    source_items(artifact)
        .iter()
        .enumerate()
        .map(|(index, item)| decode_item(index, item))
        .collect()
}

fn decode_item(index: usize, item: &Value) -> CanonicalItem {
    let concept = item.get(CONCEPT_KEY).and_then(Value::as_object);
    CanonicalItem {
        concept_id: concept
            .and_then(|c| first_present(c, CONCEPT_ID_KEYS))
            .and_then(integer),
        domain_id: concept
            .and_then(|c| first_present(c, DOMAIN_ID_KEYS))
            .and_then(Value::as_str)
            .map(str::to_string),
        concept_class_id: concept
            .and_then(|c| first_present(c, CONCEPT_CLASS_ID_KEYS))
            .and_then(Value::as_str)
            .map(str::to_string),
        include_descendants: item.get(INCLUDE_DESCENDANTS_KEY).and_then(Value::as_bool),
        handle: ItemHandle(index),
    }
}

fn first_present<'a>(fields: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|v| !v.is_null())
}

/// Integer ids, also accepting integral floats and numeric strings from loose exports.
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
