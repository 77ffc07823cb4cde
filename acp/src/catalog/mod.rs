//! Cohort catalog: trusted list of cohort definitions loaded from delimited text.
//!
//! Loaded per request; nothing here caches entries, so an allow-list built from a
//! catalog always reflects the file as it is now.

mod allowlist;

pub use allowlist::{
    clamp_max_results, filter_by_allowlist, filter_by_target, invalid_ids, AllowList,
    Recommendation, COHORT_ID_FIELD, MISSING_JUSTIFICATION, TARGET_COHORT_ID_FIELD,
};

use serde::{Deserialize, Serialize};

use crate::artifact::load_text;
use crate::error::AssistError;

/// Name columns in priority order.
const NAME_COLUMNS: &[&str] = &["cohortNameLong", "cohortName", "name"];
const ID_COLUMN: &str = "cohortId";
const LOGIC_COLUMN: &str = "logicDescription";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub cohort_id: i64,
    pub cohort_name: String,
    pub logic_description: String,
}

/// Parses catalog rows. Blank or non-integer ids become `0` (such rows are kept here
/// but never enter an [`AllowList`]).
pub fn parse_catalog_csv(text: &str) -> Result<Vec<CatalogEntry>, AssistError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| AssistError::Catalog(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let id_col = column(ID_COLUMN);
    let name_cols: Vec<usize> = NAME_COLUMNS.iter().filter_map(|n| column(n)).collect();
    let logic_col = column(LOGIC_COLUMN);

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AssistError::Catalog(e.to_string()))?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        entries.push(CatalogEntry {
            cohort_id: field(id_col).and_then(|s| s.parse().ok()).unwrap_or(0),
            cohort_name: name_cols
                .iter()
                .find_map(|i| field(Some(*i)))
                .unwrap_or_default()
                .to_string(),
            logic_description: field(logic_col).unwrap_or_default().to_string(),
        });
    }
    Ok(entries)
}

/// Loads and parses a catalog reference (local path or URL).
pub async fn load_catalog(reference: &str) -> Result<Vec<CatalogEntry>, AssistError> {
    let text = load_text(reference).await?;
    parse_catalog_csv(&text)
}
