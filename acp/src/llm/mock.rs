//! Scripted backend for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendError, ModelBackend};

/// Returns a fixed reply (or a fixed failure) and records every prompt it receives.
#[derive(Debug, Default)]
pub struct MockBackend {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a non-2xx status.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone().ok_or_else(|| BackendError::Status {
            status: 503,
            body: "mock backend unavailable".to_string(),
        })
    }
}
