//! Backend configuration, read once from the environment and then passed explicitly.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/chat/completions";
pub const DEFAULT_MODEL: &str = "agentstudyassistant";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

const ENV_API_URL: &str = "OPENWEBUI_API_URL";
const ENV_API_KEY: &str = "OPENWEBUI_API_KEY";
const ENV_MODEL: &str = "OPENWEBUI_MODEL";
const ENV_COMMAND: &str = "ACP_MODEL_CMD";
const ENV_TIMEOUT_SECS: &str = "ACP_MODEL_TIMEOUT_SECS";
const ENV_LOG: &str = "ACP_MODEL_LOG";

/// OpenAI-compatible chat completion endpoint (OpenWebUI by default).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpBackendConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

/// Local command that reads the prompt on stdin and prints the reply on stdout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandBackendConfig {
    pub command_line: String,
}

/// Which backends exist, in priority order (HTTP, then command), and shared limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelConfig {
    pub http: Option<HttpBackendConfig>,
    pub command: Option<CommandBackendConfig>,
    /// Upper bound for one backend attempt (request or subprocess).
    pub timeout: Duration,
    pub log_traffic: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            http: None,
            command: None,
            timeout: DEFAULT_TIMEOUT,
            log_traffic: true,
        }
    }
}

impl ModelConfig {
    /// Reads `OPENWEBUI_*`, `ACP_MODEL_CMD`, `ACP_MODEL_TIMEOUT_SECS` and `ACP_MODEL_LOG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http = non_empty(ENV_API_KEY).map(|api_key| HttpBackendConfig {
            api_url: non_empty(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
            model: non_empty(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        });
        let command =
            non_empty(ENV_COMMAND).map(|command_line| CommandBackendConfig { command_line });
        let timeout = non_empty(ENV_TIMEOUT_SECS)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let log_traffic = non_empty(ENV_LOG)
            .map(|v| {
                !matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "0" | "false" | "no" | "off"
                )
            })
            .unwrap_or(true);

        Self {
            http,
            command,
            timeout,
            log_traffic,
        }
    }

    pub fn has_backends(&self) -> bool {
        self.http.is_some() || self.command.is_some()
    }
}
