//! Allow-list guard over model-proposed records.
//!
//! Model output is untrusted: every identifier-bearing record is checked against the
//! ids of a trusted catalog before it reaches a caller. Rejected ids are reported
//! separately and never embedded in the cleaned records.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CatalogEntry;

pub const COHORT_ID_FIELD: &str = "cohortId";
pub const TARGET_COHORT_ID_FIELD: &str = "targetCohortId";

/// Justification used when a model record carries none.
pub const MISSING_JUSTIFICATION: &str = "Model justification not provided.";

/// Trusted cohort ids in catalog order, each with its catalog entry.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    entries: Vec<CatalogEntry>,
    index: HashMap<i64, usize>,
}

impl AllowList {
    /// Builds from catalog rows. Rows with id `0` are skipped; the first row per id wins.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let mut list = Self::default();
        for entry in entries {
            if entry.cohort_id == 0 || list.index.contains_key(&entry.cohort_id) {
                continue;
            }
            list.index.insert(entry.cohort_id, list.entries.len());
            list.entries.push(entry.clone());
        }
        list
    }

    /// Builds from bare ids (no names). Duplicates collapse; order is ascending.
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let sorted: BTreeSet<i64> = ids.into_iter().collect();
        let entries: Vec<CatalogEntry> = sorted
            .into_iter()
            .map(|cohort_id| CatalogEntry {
                cohort_id,
                cohort_name: String::new(),
                logic_description: String::new(),
            })
            .collect();
        Self::from_entries(&entries)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&CatalogEntry> {
        self.index.get(&id).map(|i| &self.entries[*i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|e| e.cohort_id)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// Clamps a requested result count to `[0, allow.len()]`.
pub fn clamp_max_results(requested: i64, allow: &AllowList) -> usize {
    let upper = i64::try_from(allow.len()).unwrap_or(i64::MAX);
    usize::try_from(requested.clamp(0, upper)).unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub cohort_id: i64,
    pub cohort_name: String,
    pub justification: String,
    #[serde(default)]
    pub confidence: Option<Value>,
}

/// Keeps records whose `cohortId` is allowed, in input order, stopping as soon as
/// `max_results` records are accepted. Missing names come from the catalog; missing
/// justifications become [`MISSING_JUSTIFICATION`].
pub fn filter_by_allowlist(
    records: &[Value],
    allow: &AllowList,
    max_results: usize,
) -> Vec<Recommendation> {
    let mut cleaned = Vec::new();
    for record in records {
        if cleaned.len() >= max_results {
            break;
        }
        let Some(entry) = record_id(record, COHORT_ID_FIELD).and_then(|id| allow.get(id)) else {
            continue;
        };
        cleaned.push(Recommendation {
            cohort_id: entry.cohort_id,
            cohort_name: non_empty_str(record, "cohortName")
                .unwrap_or(&entry.cohort_name)
                .to_string(),
            justification: non_empty_str(record, "justification")
                .unwrap_or(MISSING_JUSTIFICATION)
                .to_string(),
            confidence: record.get("confidence").filter(|v| !v.is_null()).cloned(),
        });
    }
    cleaned
}

/// Records whose `key` id is allowed, unchanged and in input order.
pub fn filter_by_target(records: &[Value], allow: &AllowList, key: &str) -> Vec<Value> {
    records
        .iter()
        .filter(|r| record_id(r, key).is_some_and(|id| allow.contains(id)))
        .cloned()
        .collect()
}

/// Non-null values under `key` that are not allowed ids, deduplicated. Integer ids come
/// first in ascending order, then any other values in first-seen order.
pub fn invalid_ids(records: &[Value], allow: &AllowList, key: &str) -> Vec<Value> {
    let mut numeric = BTreeSet::new();
    let mut other: Vec<Value> = Vec::new();
    for raw in records.iter().filter_map(|r| r.get(key)).filter(|v| !v.is_null()) {
        match as_id(raw) {
            Some(id) if allow.contains(id) => {}
            Some(id) => {
                numeric.insert(id);
            }
            None if !other.contains(raw) => other.push(raw.clone()),
            None => {}
        }
    }
    numeric.into_iter().map(Value::from).chain(other).collect()
}

fn record_id(record: &Value, key: &str) -> Option<i64> {
    record.get(key).and_then(as_id)
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}

fn non_empty_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: i64, name: &str) -> CatalogEntry {
        CatalogEntry {
            cohort_id: id,
            cohort_name: name.into(),
            logic_description: String::new(),
        }
    }

    fn catalog() -> AllowList {
        AllowList::from_entries(&[entry(1, "Asthma"), entry(2, "COPD"), entry(3, "T2DM")])
    }

    #[test]
    fn from_entries_skips_zero_and_keeps_first_duplicate() {
        let allow = AllowList::from_entries(&[entry(0, "blank"), entry(5, "first"), entry(5, "second")]);
        assert_eq!(allow.len(), 1);
        assert!(!allow.contains(0));
        assert_eq!(allow.get(5).unwrap().cohort_name, "first");
    }

    #[test]
    fn from_ids_is_sorted_and_unique() {
        let allow = AllowList::from_ids([33, 7, 33]);
        assert_eq!(allow.ids().collect::<Vec<_>>(), vec![7, 33]);
    }

    #[test]
    fn clamp_bounds_to_allowed_count() {
        let allow = catalog();
        assert_eq!(clamp_max_results(5, &allow), 3);
        assert_eq!(clamp_max_results(2, &allow), 2);
        assert_eq!(clamp_max_results(-4, &allow), 0);
        assert_eq!(clamp_max_results(1, &AllowList::default()), 0);
    }

    #[test]
    fn unknown_ids_never_pass() {
        let records = vec![
            json!({"cohortId": 99, "cohortName": "Invented"}),
            json!({"cohortId": 2}),
            json!({"cohortId": "1"}),
            json!({"cohortName": "no id"}),
        ];
        let recs = filter_by_allowlist(&records, &catalog(), 10);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].cohort_id, 2);
    }

    #[test]
    fn fills_name_and_placeholder_justification() {
        let records = vec![
            json!({"cohortId": 1, "justification": "", "confidence": 0.8}),
            json!({"cohortId": 3, "cohortName": "Custom", "justification": "fits"}),
        ];
        let recs = filter_by_allowlist(&records, &catalog(), 10);
        assert_eq!(recs[0].cohort_name, "Asthma");
        assert_eq!(recs[0].justification, MISSING_JUSTIFICATION);
        assert_eq!(recs[0].confidence, Some(json!(0.8)));
        assert_eq!(recs[1].cohort_name, "Custom");
        assert_eq!(recs[1].justification, "fits");
        assert_eq!(recs[1].confidence, None);
    }

    #[test]
    fn stops_at_cap_in_input_order() {
        let records = vec![
            json!({"cohortId": 3}),
            json!({"cohortId": 42}),
            json!({"cohortId": 1}),
            json!({"cohortId": 2}),
        ];
        let ids: Vec<i64> = filter_by_allowlist(&records, &catalog(), 2)
            .into_iter()
            .map(|r| r.cohort_id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(filter_by_allowlist(&records, &catalog(), 0).is_empty());
    }

    #[test]
    fn invalid_ids_are_sorted_and_deduplicated() {
        let records = vec![
            json!({"cohortId": 50}),
            json!({"cohortId": 1}),
            json!({"cohortId": "abc"}),
            json!({"cohortId": 7}),
            json!({"cohortId": 50}),
            json!({"cohortId": null}),
            json!({"cohortId": "abc"}),
        ];
        assert_eq!(
            invalid_ids(&records, &catalog(), COHORT_ID_FIELD),
            vec![json!(7), json!(50), json!("abc")]
        );
    }

    #[test]
    fn filter_by_target_keeps_whole_records() {
        let allow = AllowList::from_ids([33]);
        let records = vec![
            json!({"targetCohortId": 33, "summary": "tighten washout"}),
            json!({"targetCohortId": 34, "summary": "invented"}),
        ];
        let kept = filter_by_target(&records, &allow, TARGET_COHORT_ID_FIELD);
        assert_eq!(kept, vec![records[0].clone()]);
        assert_eq!(
            invalid_ids(&records, &allow, TARGET_COHORT_ID_FIELD),
            vec![json!(34)]
        );
    }
}
