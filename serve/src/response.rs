//! Error bodies (`{"error": "..."}`) and request body decoding.

use acp::AssistError;
use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, warn};

pub(crate) struct ApiError(AssistError);

impl From<AssistError> for ApiError {
    fn from(e: AssistError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!(error = %self.0, "request rejected");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

/// Decodes a JSON body into `T`. An empty body counts as `{}`; malformed JSON and
/// missing or mistyped fields are client errors.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AssistError::InvalidRequest(format!("invalid JSON body: {}", e)))?
    };
    serde_json::from_value(value)
        .map_err(|e| AssistError::InvalidRequest(e.to_string()).into())
}
