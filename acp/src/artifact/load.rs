//! Reading artifact, catalog and protocol references (local path or HTTP URL).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::AssistError;

/// Upper bound for fetching a remote reference.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves a local reference relative to the working directory.
///
/// Absolute paths are returned as-is. Relative ones are tried against the current
/// directory, then its parent (clients often include the repo folder name), then with a
/// leading `<cwd name>/` stripped. When nothing exists the cwd-relative path is returned.
pub fn resolve_local_path(reference: &str) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let Ok(cwd) = std::env::current_dir() else {
        return path.to_path_buf();
    };
    let candidate = cwd.join(path);
    if candidate.exists() {
        return candidate;
    }
    if let Some(parent) = cwd.parent() {
        let parent_candidate = parent.join(path);
        if parent_candidate.exists() {
            return parent_candidate;
        }
    }
    if let Some(base) = cwd.file_name() {
        if let Ok(trimmed) = path.strip_prefix(base) {
            let trimmed_candidate = cwd.join(trimmed);
            if trimmed_candidate.exists() {
                return trimmed_candidate;
            }
        }
    }
    candidate
}

/// Loads the text behind a reference.
pub async fn load_text(reference: &str) -> Result<String, AssistError> {
    if super::is_remote(reference) {
        return fetch_text(reference).await;
    }
    let path = resolve_local_path(reference);
    debug!(path = %path.display(), "reading local reference");
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AssistError::load(reference, e))
}

/// Loads and parses a JSON reference.
pub async fn load_json(reference: &str) -> Result<Value, AssistError> {
    let text = load_text(reference).await?;
    serde_json::from_str(&text).map_err(|e| AssistError::load(reference, e))
}

async fn fetch_text(url: &str) -> Result<String, AssistError> {
    debug!(%url, "fetching remote reference");
    let client = reqwest::Client::builder().timeout(REMOTE_TIMEOUT).build()?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AssistError::load(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(AssistError::load(url, format!("http status {}", status)));
    }
    response.text().await.map_err(|e| AssistError::load(url, e))
}
