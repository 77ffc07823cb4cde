//! Library side of the `acp` binary: command implementations and output helpers.
//!
//! Every command returns a JSON value; `main` only parses arguments and prints.

use std::path::Path;

use acp::{
    ActionEngine, AssistError, Assistant, CohortLintRequest, ConceptSetReviewRequest,
    ExecutionRequest,
};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Reads actions from standard input instead of a file.
pub const STDIN_MARKER: &str = "-";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Assist(#[from] AssistError),
    #[error("read {source_name}: {source}")]
    Read {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("actions in {0} are not valid JSON: {1}")]
    ActionsJson(String, serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flags of `acp execute`.
#[derive(Clone, Debug, Default)]
pub struct ExecuteOptions {
    pub write: bool,
    pub overwrite: bool,
    pub no_backup: bool,
    pub output: Option<String>,
}

/// Reads action descriptors from a file or stdin. Accepts either a bare array or an
/// object with an `actions` array (as a model reply or review report carries them).
pub async fn read_actions(source: &str) -> Result<Value, CliError> {
    let text = if source == STDIN_MARKER {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .map_err(|e| CliError::Read {
                source_name: "stdin".into(),
                source: e,
            })?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| CliError::Read {
                source_name: source.to_string(),
                source: e,
            })?
    };
    let value: Value =
        serde_json::from_str(&text).map_err(|e| CliError::ActionsJson(source.to_string(), e))?;
    Ok(match value {
        Value::Object(mut map) if map.contains_key("actions") => {
            map.remove("actions").unwrap_or(Value::Null)
        }
        other => other,
    })
}

/// `acp execute`: applies actions to an artifact, dry-run unless `write` is set.
pub async fn execute(
    artifact: &str,
    actions_source: &str,
    options: ExecuteOptions,
) -> Result<Value, CliError> {
    let actions = read_actions(actions_source).await?;
    debug!(artifact, actions_source, ?options, "execute");
    let request = ExecutionRequest {
        artifact_ref: artifact.to_string(),
        actions,
        write: options.write,
        overwrite: options.overwrite,
        backup: !options.no_backup,
        output_path: options.output,
    };
    let result = ActionEngine::default().execute(request).await?;
    Ok(serde_json::to_value(result)?)
}

/// `acp review concept-set`.
pub async fn review_concept_set(
    assistant: &Assistant,
    artifact: &str,
    intent: Option<String>,
) -> Result<Value, CliError> {
    let request = ConceptSetReviewRequest {
        concept_set_ref: artifact.to_string(),
        study_intent: intent.unwrap_or_default(),
    };
    Ok(serde_json::to_value(assistant.review_concept_set(&request).await?)?)
}

/// `acp review cohort`.
pub async fn review_cohort(assistant: &Assistant, artifact: &str) -> Result<Value, CliError> {
    let request = CohortLintRequest {
        cohort_ref: artifact.to_string(),
    };
    Ok(serde_json::to_value(assistant.lint_cohort(&request).await?)?)
}

/// Writes JSON to stdout or to `file`; pretty unless `compact`.
pub fn write_json_output(
    value: &Value,
    file: Option<&Path>,
    compact: bool,
) -> Result<(), CliError> {
    let s = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    match file {
        Some(path) => std::fs::write(path, format!("{}\n", s))?,
        None => {
            println!("{}", s);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn actions_file_may_be_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.json");
        std::fs::write(&path, r#"{"plan": "p", "actions": [{"type": "x"}]}"#).unwrap();
        let actions = read_actions(path.to_str().unwrap()).await.unwrap();
        assert_eq!(actions, json!([{"type": "x"}]));
    }

    #[tokio::test]
    async fn bare_array_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, "[]").unwrap();
        assert_eq!(read_actions(path.to_str().unwrap()).await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn unreadable_or_invalid_actions_fail() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            read_actions(missing.to_str().unwrap()).await,
            Err(CliError::Read { .. })
        ));
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[oops").unwrap();
        assert!(matches!(
            read_actions(bad.to_str().unwrap()).await,
            Err(CliError::ActionsJson(..))
        ));
    }

    #[tokio::test]
    async fn execute_applies_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("cs.json");
        std::fs::write(
            &artifact,
            r#"[{"concept": {"conceptId": 5, "domainId": "Drug"}, "includeDescendants": false}]"#,
        )
        .unwrap();
        let actions = dir.path().join("actions.json");
        std::fs::write(
            &actions,
            r#"[{"type": "set_include_descendants", "where": {"domainId": "Drug"}, "value": true}]"#,
        )
        .unwrap();

        let out = execute(
            artifact.to_str().unwrap(),
            actions.to_str().unwrap(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out["counts"]["applied"], json!(1));
        assert_eq!(out["written_to"], Value::Null);
    }

    #[test]
    fn json_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json_output(&json!({"a": 1}), Some(&path), true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
    }
}
