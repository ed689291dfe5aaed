use serde_json::Value;

use super::traits::{AdapterError, FormatAdapter, TransformedRequest};
use crate::constants::{ANTHROPIC_MESSAGES_PATH, ANTHROPIC_VERSION};
use crate::store::VendorConfig;
use crate::types::claude::ClaudeNativeRequest;
use crate::vendor::{vendor_endpoints, ApiFormat};

/// Adapter for upstreams that already speak the Anthropic message API.
/// Requests and responses pass through byte-for-byte; only the URL and the
/// authentication headers are supplied.
pub struct AnthropicPassthroughAdapter;

impl FormatAdapter for AnthropicPassthroughAdapter {
    fn format(&self) -> ApiFormat {
        ApiFormat::Anthropic
    }

    fn transform_request(
        &self,
        _req: &ClaudeNativeRequest,
        raw_body: &Value,
        config: &VendorConfig,
    ) -> Result<TransformedRequest, AdapterError> {
        let endpoint = vendor_endpoints(config.api_type)
            .anthropic_path
            .unwrap_or(ANTHROPIC_MESSAGES_PATH);
        let url = format!("{}{}", config.base_url.trim_end_matches('/'), endpoint);

        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("x-api-key".to_string(), config.api_key.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ];
        if let Some(custom) = &config.custom_headers {
            for (name, value) in custom {
                headers.push((name.clone(), value.clone()));
            }
        }

        Ok(TransformedRequest {
            url,
            headers,
            body: raw_body.clone(),
        })
    }

    fn transform_response(&self, body: &[u8]) -> Result<Value, AdapterError> {
        serde_json::from_slice(body).map_err(|e| AdapterError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::VendorKind;
    use serde_json::json;

    fn config() -> VendorConfig {
        VendorConfig {
            id: "c1".into(),
            name: "anthropic".into(),
            api_key: "sk-ant".into(),
            base_url: "https://api.anthropic.com".into(),
            model: "claude-3-5-sonnet".into(),
            api_type: VendorKind::Anthropic,
            ..Default::default()
        }
    }

    #[test]
    fn request_transform_is_deterministic_and_identity_on_body() {
        let raw = json!({
            "model": "claude-3-5-sonnet",
            "messages": [{"role": "user", "content": "hi"}],
            "metadata": {"user_id": "u1"}
        });
        let req: ClaudeNativeRequest = serde_json::from_value(raw.clone()).unwrap();
        let adapter = AnthropicPassthroughAdapter;

        let a = adapter.transform_request(&req, &raw, &config()).unwrap();
        let b = adapter.transform_request(&req, &raw, &config()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(a.body, raw);
        assert!(a
            .headers
            .iter()
            .any(|(k, v)| k == "x-api-key" && v == "sk-ant"));
        assert!(a
            .headers
            .iter()
            .any(|(k, v)| k == "anthropic-version" && v == "2023-06-01"));
    }

    #[test]
    fn custom_headers_are_appended_in_stable_order() {
        let mut cfg = config();
        cfg.custom_headers = Some(
            [
                ("x-b".to_string(), "2".to_string()),
                ("x-a".to_string(), "1".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let raw = json!({"model": "m", "messages": []});
        let req: ClaudeNativeRequest = serde_json::from_value(raw.clone()).unwrap();

        let out = AnthropicPassthroughAdapter
            .transform_request(&req, &raw, &cfg)
            .unwrap();
        let tail: Vec<_> = out.headers.iter().rev().take(2).rev().cloned().collect();
        assert_eq!(tail[0].0, "x-a");
        assert_eq!(tail[1].0, "x-b");
    }

    #[test]
    fn response_passes_through_unchanged() {
        let body = json!({"id": "msg_1", "type": "message", "content": []});
        let out = AnthropicPassthroughAdapter
            .transform_response(body.to_string().as_bytes())
            .unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn does_not_reframe_streams() {
        assert!(!AnthropicPassthroughAdapter.reframes_stream());
        assert!(AnthropicPassthroughAdapter.transform_stream("data: x\n\n").is_none());
    }
}
