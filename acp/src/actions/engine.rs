//! Action execution engine: load, validate, apply, optionally persist, respond.
//!
//! Per request the engine moves through [`ExecutionStage`]s in order. It owns the loaded
//! artifact for the whole request; the on-disk file is only touched by the
//! [`WriteController`] and only after every action has been applied in memory.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{apply_actions, ApplyReport, IgnoredAction};
use crate::artifact::{
    ensure_shape, load_json, ArtifactRef, ChangeRecord, WriteController, WriteOptions,
};
use crate::error::AssistError;

fn default_true() -> bool {
    true
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

/// Body of an execution request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub artifact_ref: String,
    /// Raw action descriptors. Must be a JSON array.
    #[serde(default = "empty_list")]
    pub actions: Value,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub backup: bool,
    /// Write here instead of `artifact_ref`.
    #[serde(default, alias = "output_path")]
    pub output_path: Option<String>,
}

impl ExecutionRequest {
    /// Dry run over `artifact_ref` with default flags.
    pub fn new(artifact_ref: impl Into<String>, actions: Vec<Value>) -> Self {
        Self {
            artifact_ref: artifact_ref.into(),
            actions: Value::Array(actions),
            write: false,
            overwrite: false,
            backup: true,
            output_path: None,
        }
    }

    fn write_target(&self) -> &str {
        self.output_path.as_deref().unwrap_or(&self.artifact_ref)
    }
}

/// Body of a direct concept-set edit. Defaults differ from [`ExecutionRequest`]:
/// overwrite in place, no backup.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSetEditRequest {
    pub artifact_ref: String,
    #[serde(default = "empty_list")]
    pub ops: Value,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub backup: bool,
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default, alias = "output_path")]
    pub output_path: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionCounts {
    pub applied: usize,
    /// Total change records across applied actions.
    pub changed: usize,
    pub ignored: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub plan: String,
    pub preview_changes: Vec<ChangeRecord>,
    pub counts: ExecutionCounts,
    pub ignored: Vec<IgnoredAction>,
    pub artifact: String,
    pub applied: bool,
    pub written_to: Option<PathBuf>,
    pub backup_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConceptSetEditResult {
    pub plan: String,
    pub preview_changes: Vec<ChangeRecord>,
    pub ignored: Vec<IgnoredAction>,
    pub applied: bool,
    pub written_to: Option<PathBuf>,
    pub backup_file: Option<PathBuf>,
    pub ops: Value,
}

const EDIT_PLAN: &str = "Set includeDescendants=true for Drug/Ingredient entries that lack it.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStage {
    Loaded,
    Validating,
    Applying,
    Skipped,
    Persisted,
    Responded,
}

impl ExecutionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Validating => "validating",
            Self::Applying => "applying",
            Self::Skipped => "skipped",
            Self::Persisted => "persisted",
            Self::Responded => "responded",
        }
    }
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(stage: ExecutionStage, artifact: &str) {
    debug!(%stage, artifact, "execution stage");
}

/// Applies actions to artifacts and hands persisted results to the write controller.
#[derive(Clone, Default)]
pub struct ActionEngine {
    writer: Arc<WriteController>,
}

impl ActionEngine {
    pub fn new(writer: Arc<WriteController>) -> Self {
        Self { writer }
    }

    /// Runs one execution request.
    ///
    /// Fails only for an invalid request, an unloadable or non-container artifact, a
    /// non-local write target, or a failed write. Individual actions never fail it.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, AssistError> {
        let actions = request
            .actions
            .as_array()
            .ok_or_else(|| AssistError::InvalidRequest("actions must be a list".into()))?;
        if request.write {
            reject_remote_target(request.write_target())?;
        }

        let artifact_ref = request.artifact_ref.as_str();
        let mut artifact = load_json(artifact_ref).await?;
        ensure_shape(&artifact)?;
        enter(ExecutionStage::Loaded, artifact_ref);

        enter(ExecutionStage::Validating, artifact_ref);
        enter(ExecutionStage::Applying, artifact_ref);
        let ApplyReport {
            applied,
            preview_changes,
            ignored,
        } = apply_actions(&mut artifact, actions);

        let (written_to, backup_file) = if request.write {
            let outcome = self
                .writer
                .write_json(
                    request.write_target(),
                    &artifact,
                    WriteOptions {
                        backup: request.backup,
                        overwrite: request.overwrite,
                    },
                )
                .await?;
            enter(ExecutionStage::Persisted, artifact_ref);
            (Some(outcome.written_to), outcome.backup_file)
        } else {
            enter(ExecutionStage::Skipped, artifact_ref);
            (None, None)
        };

        let counts = ExecutionCounts {
            applied,
            changed: preview_changes.len(),
            ignored: ignored.len(),
        };
        info!(
            artifact = artifact_ref,
            applied = counts.applied,
            changed = counts.changed,
            ignored = counts.ignored,
            written = written_to.is_some(),
            "actions executed"
        );
        enter(ExecutionStage::Responded, artifact_ref);
        Ok(ExecutionResult {
            plan: format!(
                "Execute LLM actions ({} applied, {} ignored).",
                counts.applied, counts.ignored
            ),
            preview_changes,
            counts,
            ignored,
            artifact: request.artifact_ref,
            applied: written_to.is_some(),
            written_to,
            backup_file,
        })
    }

    /// Applies caller-authored ops (same descriptors as actions) and optionally writes.
    pub async fn edit_concept_set(
        &self,
        request: ConceptSetEditRequest,
    ) -> Result<ConceptSetEditResult, AssistError> {
        let ops = request
            .ops
            .as_array()
            .ok_or_else(|| AssistError::InvalidRequest("ops must be a list".into()))?;
        let target = request
            .output_path
            .as_deref()
            .unwrap_or(&request.artifact_ref);
        if request.write {
            reject_remote_target(target)?;
        }

        let mut artifact = load_json(&request.artifact_ref).await?;
        ensure_shape(&artifact)?;
        let report = apply_actions(&mut artifact, ops);

        let (written_to, backup_file) = if request.write {
            let outcome = self
                .writer
                .write_json(
                    target,
                    &artifact,
                    WriteOptions {
                        backup: request.backup,
                        overwrite: request.overwrite,
                    },
                )
                .await?;
            (Some(outcome.written_to), outcome.backup_file)
        } else {
            (None, None)
        };

        Ok(ConceptSetEditResult {
            plan: EDIT_PLAN.to_string(),
            preview_changes: report.preview_changes,
            ignored: report.ignored,
            applied: written_to.is_some(),
            written_to,
            backup_file,
            ops: request.ops,
        })
    }
}

fn reject_remote_target(target: &str) -> Result<(), AssistError> {
    if ArtifactRef::parse(target)?.is_remote() {
        return Err(AssistError::WriteTarget(target.to_string()));
    }
    Ok(())
}
