//! Model invocation abstraction.
//!
//! A prompt goes to each configured backend in priority order (HTTP chat completion,
//! then the local command line); the first reply that yields a JSON object wins.
//! [`ModelInvoker::invoke`] never fails: every backend error, timeout or unusable reply
//! degrades to `None`, and callers continue with deterministic rules only.
//!
//! # Known limitation
//!
//! Extraction takes the text between the first `{` and the last `}` of the reply
//! (see [`extract_json_object`]). A reply that closes the real object and then adds
//! prose or a fenced block containing another `}` yields an unparsable slice, and the
//! backend's reply is treated as empty. Backends that return pure JSON are unaffected.

mod command;
mod config;
mod extract;
mod http;
mod mock;

pub use command::CommandBackend;
pub use config::{
    CommandBackendConfig, HttpBackendConfig, ModelConfig, DEFAULT_API_URL, DEFAULT_MODEL,
    DEFAULT_TIMEOUT,
};
pub use extract::extract_json_object;
pub use http::HttpChatBackend;
pub use mock::MockBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Target for prompt/reply traffic logging.
pub(crate) const TRAFFIC_TARGET: &str = "acp::model";

/// Failure of a single backend attempt. Never leaves [`ModelInvoker::invoke`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command exited with {0}")]
    Exit(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("model command is empty or unparsable")]
    EmptyCommand,
}

/// One way of turning a prompt into reply text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Sends the prompt and returns the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Ordered list of backends plus traffic-logging switch.
#[derive(Clone, Default)]
pub struct ModelInvoker {
    backends: Vec<Arc<dyn ModelBackend>>,
    log_traffic: bool,
}

impl ModelInvoker {
    pub fn new(backends: Vec<Arc<dyn ModelBackend>>) -> Self {
        Self {
            backends,
            log_traffic: true,
        }
    }

    /// Builds backends from configuration: HTTP first when a credential is present,
    /// then the command line when one is configured. A backend that cannot be built is
    /// logged and left out; the others still serve.
    pub fn from_config(config: &ModelConfig) -> Self {
        if !config.has_backends() {
            info!("no model backend configured; reviews use rules only");
        }
        let mut backends: Vec<Arc<dyn ModelBackend>> = Vec::new();
        if let Some(http) = &config.http {
            match HttpChatBackend::new(http.clone(), config.timeout) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => warn!(backend = "http", error = %e, "model backend disabled"),
            }
        }
        if let Some(command) = &config.command {
            match CommandBackend::new(command, config.timeout) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => warn!(
                    backend = "command",
                    command_line = %command.command_line,
                    error = %e,
                    "model backend disabled"
                ),
            }
        }
        Self {
            backends,
            log_traffic: config.log_traffic,
        }
    }

    /// No backends: every invocation returns `None`.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_traffic_logging(mut self, enabled: bool) -> Self {
        self.log_traffic = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.backends.is_empty()
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Returns the first JSON object any backend yields, or `None`.
    pub async fn invoke(&self, prompt: &str) -> Option<Map<String, Value>> {
        for backend in &self.backends {
            if self.log_traffic {
                debug!(
                    target: TRAFFIC_TARGET,
                    backend = backend.name(),
                    "outgoing prompt:\n{}",
                    prompt
                );
            }
            let text = match backend.complete(prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "model backend failed");
                    continue;
                }
            };
            if self.log_traffic {
                debug!(
                    target: TRAFFIC_TARGET,
                    backend = backend.name(),
                    "incoming text:\n{}",
                    text
                );
            }
            match extract_json_object(&text) {
                Some(object) => return Some(object),
                None => warn!(backend = backend.name(), "model reply contained no JSON object"),
            }
        }
        None
    }
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("backends", &self.backend_names())
            .field("log_traffic", &self.log_traffic)
            .finish()
    }
}
