//! Route table for the proxy listener.
//!
//! Permissive CORS headers go on every response, bare `OPTIONS` requests
//! short-circuit with 204, any path ending in `/count_tokens` is answered
//! locally, and everything else is forwarded through the selected adapter.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::errors::ProxyError;
use super::forward::handle_forward;
use super::service::SharedState;
use crate::constants::COUNT_TOKENS_SUFFIX;
use crate::token::estimate_request_tokens;
use crate::types::claude::ClaudeNativeRequest;

pub fn routes(shared: Arc<SharedState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/",
            get(|| async { "ccbridge proxy is running." })
                .options(|| async { StatusCode::NO_CONTENT }),
        )
        .fallback(dispatch)
        .layer(cors)
        .with_state(shared)
}

async fn dispatch(
    State(state): State<Arc<SharedState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    // The token-count shim matches on the suffix alone so that any prefix a
    // client library prepends (/v1/messages, /v1/beta/messages, ...) works.
    if uri.path().ends_with(COUNT_TOKENS_SUFFIX) {
        return handle_count_tokens(state, body).await;
    }
    handle_forward(state, body).await
}

/// Local token counting; never touches the adapter or the upstream.
async fn handle_count_tokens(state: Arc<SharedState>, body: Bytes) -> Response {
    let req: ClaudeNativeRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            log::warn!("count_tokens body unparseable: {}", e);
            return ProxyError::InvalidRequest(e.to_string()).into_response();
        }
    };
    let count = estimate_request_tokens(&req, state.tokenizer.as_ref());
    log::debug!("count_tokens: estimated {} input tokens", count.input);
    Json(json!({
        "input_tokens": count.input,
        "cache_read_input_tokens": 0,
        "cache_creation_input_tokens": count.cache_creation,
    }))
    .into_response()
}
