//! Chat-completion backend (OpenAI-compatible request shape).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{BackendError, HttpBackendConfig, ModelBackend};

/// Sends the prompt as a single user message and returns the first choice's content,
/// or the raw body when the reply does not have the chat-completion shape.
pub struct HttpChatBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpChatBackend {
    pub fn new(config: HttpBackendConfig, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ModelBackend for HttpChatBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let res = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(message_content(&body).unwrap_or_else(|| body.trim().to_string()))
    }
}

/// `choices[0].message.content` when the body is a chat-completion reply.
fn message_content(body: &str) -> Option<String> {
    let data: Value = serde_json::from_str(body).ok()?;
    data.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}
