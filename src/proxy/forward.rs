//! The forwarding path: adapter selection, the outbound call with its abort
//! deadline, one-shot endpoint-format fallback, and response adaptation.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;

use super::errors::{ProxyError, ProxyResult};
use super::service::SharedState;
use super::stream::relay_sse_stream;
use crate::adapter::{select_adapter, AdapterEnum, FormatAdapter};
use crate::store::VendorConfig;
use crate::types::claude::ClaudeNativeRequest;

// Body phrasings that mean "this path does not exist here", as various
// gateways spell it. Checked together with a bare 404 status.
const ENDPOINT_MISSING_PHRASES: &[&str] = &[
    "not found",
    "not_found",
    "no route",
    "cannot post",
    "does not exist",
    "unknown request url",
    "unrecognized request",
    "invalid url",
    "404",
];

pub async fn handle_forward(state: Arc<SharedState>, body: Bytes) -> Response {
    match forward(state, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward(state: Arc<SharedState>, body: Bytes) -> ProxyResult<Response> {
    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    let req: ClaudeNativeRequest = serde_json::from_value(raw.clone())
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    let is_streaming = req.stream.unwrap_or(false);

    let config = state.config.read().clone();
    let adapter = select_adapter(&config);
    log::debug!(
        "forwarding request for model '{}' via {} adapter (stream: {})",
        req.model,
        adapter.format(),
        is_streaming
    );

    let upstream = send_upstream(&state, &adapter, &req, &raw, &config).await?;
    if upstream.status().is_success() {
        return respond(adapter, upstream, is_streaming).await;
    }

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let error_body = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    // One-shot fallback: an endpoint-missing answer on the Anthropic path
    // flips the config to the OpenAI format, persists the flag, and retries
    // exactly once. A failing retry is terminal for this request.
    if is_endpoint_unavailable(status, &error_body) && !config.force_openai_format {
        log::warn!(
            "endpoint unavailable at {} (status {}), switching to openai format",
            config.base_url,
            status
        );
        let updated = {
            let mut live = state.config.write();
            live.force_openai_format = true;
            live.clone()
        };
        if let Err(e) = state.store.save_api_config(&updated) {
            log::warn!("failed to persist format fallback: {}", e);
        }

        let retry_adapter = select_adapter(&updated);
        let retry = send_upstream(&state, &retry_adapter, &req, &raw, &updated).await?;
        if retry.status().is_success() {
            return respond(retry_adapter, retry, is_streaming).await;
        }
        let retry_status = retry.status();
        let retry_content_type = retry.headers().get(header::CONTENT_TYPE).cloned();
        let retry_body = retry
            .bytes()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;
        log::warn!("fallback retry failed with status {}", retry_status);
        return Ok(passthrough(retry_status, retry_content_type, retry_body));
    }

    Ok(passthrough(status, content_type, error_body))
}

/// Transforms the request and issues the outbound call under the configured
/// abort deadline. The fallback retry calls this again with a fresh budget.
async fn send_upstream(
    state: &SharedState,
    adapter: &AdapterEnum,
    req: &ClaudeNativeRequest,
    raw: &Value,
    config: &VendorConfig,
) -> ProxyResult<reqwest::Response> {
    let transformed = adapter.transform_request(req, raw, config)?;
    let mut builder = state.client.post(&transformed.url);
    for (name, value) in &transformed.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let send = builder.json(&transformed.body).send();

    match tokio::time::timeout(state.upstream_timeout, send).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(ProxyError::Upstream(e.to_string())),
        Err(_) => {
            log::warn!(
                "upstream request to {} aborted after {:?}",
                transformed.url,
                state.upstream_timeout
            );
            Err(ProxyError::Timeout)
        }
    }
}

async fn respond(
    adapter: AdapterEnum,
    upstream: reqwest::Response,
    is_streaming: bool,
) -> ProxyResult<Response> {
    if is_streaming {
        let body = relay_sse_stream(upstream, Arc::new(adapter));
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(body)
            .map_err(|e| ProxyError::Internal(e.to_string()))?;
        return Ok(response);
    }

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;
    let value = adapter.transform_response(&bytes)?;
    Ok((StatusCode::OK, Json(value)).into_response())
}

/// Relays a non-2xx upstream answer with its original status and body.
fn passthrough(
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let content_type = content_type
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    response
}

fn is_endpoint_unavailable(status: StatusCode, body: &[u8]) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    let text = String::from_utf8_lossy(body).to_lowercase();
    ENDPOINT_MISSING_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_404_is_endpoint_unavailable() {
        assert!(is_endpoint_unavailable(StatusCode::NOT_FOUND, b"{}"));
    }

    #[test]
    fn known_phrasing_is_endpoint_unavailable_on_any_status() {
        assert!(is_endpoint_unavailable(
            StatusCode::BAD_REQUEST,
            br#"{"error": "Cannot POST /v1/messages"}"#
        ));
        assert!(is_endpoint_unavailable(
            StatusCode::BAD_GATEWAY,
            br#"{"message": "route not_found"}"#
        ));
    }

    #[test]
    fn ordinary_errors_do_not_qualify() {
        assert!(!is_endpoint_unavailable(
            StatusCode::UNAUTHORIZED,
            br#"{"error": "invalid api key"}"#
        ));
        assert!(!is_endpoint_unavailable(
            StatusCode::TOO_MANY_REQUESTS,
            br#"{"error": "rate limited"}"#
        ));
    }
}
