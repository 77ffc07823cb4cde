//! Request-level errors.
//!
//! Only structural and destination-safety problems surface here. Unsupported or
//! non-matching actions are not errors; they become ignored entries in the
//! execution result. Model backend failures never reach this type (see
//! [`crate::llm::BackendError`]).

use thiserror::Error;

/// Error that aborts a whole request.
#[derive(Debug, Error)]
pub enum AssistError {
    /// Artifact is neither a container object nor an ordered sequence.
    #[error("artifact must be a JSON object or array, got {0}")]
    Shape(&'static str),

    /// Write requested against a reference that is not a local file.
    #[error("write only supported to local files: {0}")]
    WriteTarget(String),

    /// Request body is missing required fields or has the wrong types.
    #[error("{0}")]
    InvalidRequest(String),

    /// Artifact, catalog or text reference could not be read.
    #[error("failed to load {reference}: {message}")]
    Load { reference: String, message: String },

    /// Cohort catalog rows could not be parsed.
    #[error("catalog: {0}")]
    Catalog(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistError {
    /// True when the caller sent something unusable (maps to HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Shape(_)
                | Self::WriteTarget(_)
                | Self::InvalidRequest(_)
                | Self::Load { .. }
                | Self::Catalog(_)
        )
    }

    pub(crate) fn load(reference: impl Into<String>, message: impl ToString) -> Self {
        Self::Load {
            reference: reference.into(),
            message: message.to_string(),
        }
    }
}
