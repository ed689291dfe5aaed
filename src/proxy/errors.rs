use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::store::StoreError;

/// Request-handling errors. Every variant renders as a complete HTTP
/// response; the proxy never leaves a connection hanging.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The inbound body could not be parsed.
    #[error("invalid request body: {0}")]
    InvalidRequest(String),
    /// The outbound request exceeded its abort deadline.
    #[error("request timeout")]
    Timeout,
    /// The outbound request failed before a response arrived.
    #[error("upstream request failed: {0}")]
    Upstream(String),
    /// No active vendor configuration is available.
    #[error("no active API configuration")]
    NotConfigured,
    #[error("{0}")]
    Internal(String),
}

impl From<AdapterError> for ProxyError {
    fn from(e: AdapterError) -> Self {
        ProxyError::Internal(e.to_string())
    }
}

impl From<StoreError> for ProxyError {
    fn from(e: StoreError) -> Self {
        ProxyError::Internal(e.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        // Timeouts carry a distinguishable flat body so callers can tell
        // them apart from other failures.
        if matches!(self, ProxyError::Timeout) {
            return (
                StatusCode::REQUEST_TIMEOUT,
                Json(json!({ "error": "Request timeout" })),
            )
                .into_response();
        }

        let message = self.to_string();
        log::error!("proxy error: {}", message);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": message, "type": "internal_error" } })),
        )
            .into_response()
    }
}

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
