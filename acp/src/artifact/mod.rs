//! Artifact references and the structures behind them.
//!
//! An artifact is a concept set or cohort definition held as a `serde_json::Value`.
//! [`canonicalize`] projects its items into [`CanonicalItem`]s, [`apply_set_include_descendants`]
//! writes back through the item handles, and [`WriteController`] is the only writer of files.

mod canonical;
mod load;
mod mutate;
mod write;

use std::path::PathBuf;

pub use canonical::{canonicalize, source_items, CanonicalItem, ItemHandle};
pub use load::{load_json, load_text, resolve_local_path};
pub use mutate::{apply_set_include_descendants, ChangeRecord, DescendantsState, Filter};
pub use write::{WriteController, WriteOptions, WriteOutcome};

use crate::error::AssistError;

/// Where an artifact lives: a local file or an HTTP(S) URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactRef {
    Local(PathBuf),
    Remote(url::Url),
}

impl ArtifactRef {
    /// Parses a reference string. `http://` and `https://` prefixes are remote; anything
    /// else is resolved as a local path with [`resolve_local_path`].
    pub fn parse(reference: &str) -> Result<Self, AssistError> {
        if is_remote(reference) {
            let url = url::Url::parse(reference)
                .map_err(|e| AssistError::load(reference, format!("invalid url: {}", e)))?;
            Ok(Self::Remote(url))
        } else {
            Ok(Self::Local(resolve_local_path(reference)))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Checks that a loaded artifact is a container object or an ordered sequence.
pub fn ensure_shape(artifact: &serde_json::Value) -> Result<(), AssistError> {
    use serde_json::Value;
    match artifact {
        Value::Object(_) | Value::Array(_) => Ok(()),
        Value::Null => Err(AssistError::Shape("null")),
        Value::Bool(_) => Err(AssistError::Shape("boolean")),
        Value::Number(_) => Err(AssistError::Shape("number")),
        Value::String(_) => Err(AssistError::Shape("string")),
    }
}
