use serde_json::Value;
use thiserror::Error;

use crate::store::VendorConfig;
use crate::types::claude::ClaudeNativeRequest;
use crate::vendor::ApiFormat;

/// Errors produced while translating between wire formats.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("upstream response is not valid JSON: {0}")]
    InvalidResponse(String),
    #[error("upstream response contained no choices")]
    EmptyResponse,
    #[error("tool call '{name}' carried unparseable arguments: {error}")]
    ToolArguments { name: String, error: String },
    #[error("{0}")]
    Internal(String),
}

/// A fully prepared outbound request. Produced by a pure function of the
/// inbound request and the vendor configuration; carries no cross-request
/// state. Headers are an ordered list so the same input always renders the
/// same wire bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Converts the canonical Anthropic-style request into one vendor's wire
/// format and the vendor's response (or stream) back into the canonical
/// shape.
pub trait FormatAdapter: Send + Sync {
    /// The wire format this adapter speaks toward the upstream.
    fn format(&self) -> ApiFormat;

    /// Builds the outbound request. `raw_body` is the inbound JSON exactly
    /// as the client sent it; passthrough adapters forward it unchanged so
    /// fields the typed model does not know about survive.
    fn transform_request(
        &self,
        req: &ClaudeNativeRequest,
        raw_body: &Value,
        config: &VendorConfig,
    ) -> Result<TransformedRequest, AdapterError>;

    /// Converts a complete (non-streaming) upstream response body into the
    /// canonical response shape.
    fn transform_response(&self, body: &[u8]) -> Result<Value, AdapterError>;

    /// Whether streamed chunks must pass through [`Self::transform_stream`].
    /// When false the proxy relays upstream bytes verbatim.
    fn reframes_stream(&self) -> bool {
        false
    }

    /// Re-frames one upstream SSE chunk into Anthropic-style events.
    /// `None` means the chunk produced no output (sentinel, keep-alive, or
    /// malformed data) and is skipped; this never fails the stream.
    fn transform_stream(&self, _chunk: &str) -> Option<String> {
        None
    }
}
