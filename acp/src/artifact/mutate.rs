//! Filter-and-set over canonical items: the single supported mutation primitive.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::canonical::{canonicalize, source_items_mut, CanonicalItem, INCLUDE_DESCENDANTS_KEY};

/// Item filter. Absent fields match everything; present fields must be exactly equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_descendants: Option<bool>,
}

impl Filter {
    /// Keys a proposed `where` object may carry; anything else is stripped.
    pub const FIELDS: [&'static str; 3] = ["domainId", "conceptClassId", "includeDescendants"];

    pub fn matches(&self, item: &CanonicalItem) -> bool {
        if let Some(domain) = &self.domain_id {
            if item.domain_id.as_deref() != Some(domain.as_str()) {
                return false;
            }
        }
        if let Some(class) = &self.concept_class_id {
            if item.concept_class_id.as_deref() != Some(class.as_str()) {
                return false;
            }
        }
        if let Some(flag) = self.include_descendants {
            if item.descendants_flag() != flag {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescendantsState {
    pub include_descendants: bool,
}

/// One matched item. The record means "this item satisfies the rule", so re-applying
/// an action produces the same records even when no value changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub concept_id: i64,
    pub from: DescendantsState,
    pub to: DescendantsState,
}

/// Sets `includeDescendants = value` on every item with a concept id that matches `filter`,
/// writing in place through the item handles. Returns one record per matched item.
pub fn apply_set_include_descendants(
    artifact: &mut Value,
    filter: &Filter,
    value: bool,
) -> Vec<ChangeRecord> {
    let items = canonicalize(artifact);
    let Some(source) = source_items_mut(artifact) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for item in &items {
        let Some(concept_id) = item.concept_id else {
            continue;
        };
        if !filter.matches(item) {
            continue;
        }
        records.push(ChangeRecord {
            concept_id,
            from: DescendantsState {
                include_descendants: item.descendants_flag(),
            },
            to: DescendantsState {
                include_descendants: value,
            },
        });
        if let Some(raw) = source
            .get_mut(item.handle.index())
            .and_then(Value::as_object_mut)
        {
            raw.insert(INCLUDE_DESCENDANTS_KEY.to_string(), Value::Bool(value));
        }
    }
    records
}
