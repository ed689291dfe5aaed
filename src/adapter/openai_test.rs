//! Tests for the OpenAI-compatible adapter, with emphasis on the lossy
//! outbound message conversion and the stream re-framing rules.

use serde_json::{json, Value};

use super::openai::OpenAiCompatAdapter;
use super::traits::FormatAdapter;
use crate::adapter::AdapterError;
use crate::store::VendorConfig;
use crate::types::claude::ClaudeNativeRequest;
use crate::vendor::VendorKind;

fn config() -> VendorConfig {
    VendorConfig {
        id: "c1".into(),
        name: "compat".into(),
        api_key: "sk-test".into(),
        base_url: "https://llm.example.com".into(),
        model: "glm-4".into(),
        api_type: VendorKind::Custom,
        ..Default::default()
    }
}

fn transform(raw: Value) -> Value {
    let req: ClaudeNativeRequest = serde_json::from_value(raw.clone()).unwrap();
    OpenAiCompatAdapter
        .transform_request(&req, &raw, &config())
        .unwrap()
        .body
}

#[test]
fn non_text_blocks_are_dropped_from_messages() {
    let body = transform(json!({
        "model": "claude-3-5-sonnet",
        "messages": [{"role": "assistant", "content": [
            {"type": "text", "text": "a"},
            {"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "x"}}
        ]}]
    }));
    assert_eq!(body["messages"][0]["role"], "assistant");
    assert_eq!(body["messages"][0]["content"], "a");
    assert!(body["messages"][0].get("tool_calls").is_none());
}

#[test]
fn text_blocks_join_with_newlines_and_other_roles_become_user() {
    let body = transform(json!({
        "model": "m",
        "messages": [{"role": "tool", "content": [
            {"type": "text", "text": "first"},
            {"type": "text", "text": "second"}
        ]}]
    }));
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "first\nsecond");
}

#[test]
fn defaults_fill_missing_generation_parameters() {
    let body = transform(json!({
        "model": "m",
        "messages": [{"role": "user", "content": "hi"}]
    }));
    assert_eq!(body["temperature"], json!(0.7));
    assert_eq!(body["max_tokens"], json!(4096));
    assert_eq!(body["stream"], json!(false));
    // Unset optionals are stripped, not serialized as null.
    assert!(body.get("tools").is_none());
}

#[test]
fn client_parameters_override_the_defaults() {
    let body = transform(json!({
        "model": "m",
        "messages": [],
        "temperature": 0.2,
        "max_tokens": 512,
        "stream": true
    }));
    assert_eq!(body["temperature"], json!(0.2));
    assert_eq!(body["max_tokens"], json!(512));
    assert_eq!(body["stream"], json!(true));
}

#[test]
fn system_prompt_leads_the_message_list() {
    let body = transform(json!({
        "model": "m",
        "system": "be terse",
        "messages": [{"role": "user", "content": "hi"}]
    }));
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "be terse");
    assert_eq!(body["messages"][1]["role"], "user");
}

#[test]
fn tools_map_to_openai_function_shape() {
    let body = transform(json!({
        "model": "m",
        "messages": [],
        "tools": [{
            "name": "search",
            "description": "Search the web",
            "input_schema": {"type": "object"}
        }]
    }));
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "search");
    assert_eq!(body["tools"][0]["function"]["parameters"], json!({"type": "object"}));
}

#[test]
fn url_and_headers_use_the_vendor_endpoint_and_bearer_auth() {
    let raw = json!({"model": "m", "messages": []});
    let req: ClaudeNativeRequest = serde_json::from_value(raw.clone()).unwrap();
    let out = OpenAiCompatAdapter
        .transform_request(&req, &raw, &config())
        .unwrap();
    assert_eq!(out.url, "https://llm.example.com/v1/chat/completions");
    assert!(out
        .headers
        .iter()
        .any(|(k, v)| k == "authorization" && v == "Bearer sk-test"));
}

#[test]
fn configured_model_replaces_the_inbound_model() {
    let body = transform(json!({
        "model": "claude-3-5-sonnet",
        "messages": []
    }));
    assert_eq!(body["model"], "glm-4");
}

#[test]
fn response_converts_text_tool_calls_and_usage() {
    let upstream = json!({
        "id": "chatcmpl-1",
        "model": "glm-4",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "thinking done",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}
                }]
            },
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46}
    });
    let out = OpenAiCompatAdapter
        .transform_response(upstream.to_string().as_bytes())
        .unwrap();

    assert_eq!(out["type"], "message");
    assert_eq!(out["role"], "assistant");
    assert_eq!(out["stop_reason"], "end_turn");
    assert_eq!(out["content"][0]["type"], "text");
    assert_eq!(out["content"][0]["text"], "thinking done");
    assert_eq!(out["content"][1]["type"], "tool_use");
    assert_eq!(out["content"][1]["name"], "search");
    assert_eq!(out["content"][1]["input"], json!({"q": "rust"}));
    assert_eq!(out["usage"]["input_tokens"], 12);
    assert_eq!(out["usage"]["output_tokens"], 34);
}

#[test]
fn finish_reason_mapping_follows_the_table() {
    for (upstream_reason, expected) in [
        ("stop", "end_turn"),
        ("length", "max_tokens"),
        ("content_filter", "end_turn"),
        ("tool_calls", "end_turn"),
    ] {
        let upstream = json!({
            "id": "r",
            "choices": [{
                "message": {"role": "assistant", "content": "x"},
                "finish_reason": upstream_reason
            }]
        });
        let out = OpenAiCompatAdapter
            .transform_response(upstream.to_string().as_bytes())
            .unwrap();
        assert_eq!(out["stop_reason"], expected, "reason {}", upstream_reason);
    }
}

#[test]
fn malformed_tool_arguments_fail_the_response() {
    let upstream = json!({
        "id": "r",
        "choices": [{
            "message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "function": {"name": "search", "arguments": "{not json"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    });
    let err = OpenAiCompatAdapter
        .transform_response(upstream.to_string().as_bytes())
        .unwrap_err();
    assert!(matches!(err, AdapterError::ToolArguments { .. }));
}

#[test]
fn empty_choices_is_an_error_not_a_panic() {
    let err = OpenAiCompatAdapter
        .transform_response(json!({"id": "r", "choices": []}).to_string().as_bytes())
        .unwrap_err();
    assert!(matches!(err, AdapterError::EmptyResponse));
}

#[test]
fn stream_chunk_reframes_delta_content() {
    let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"},\"index\":0}]}\n\n";
    let out = OpenAiCompatAdapter.transform_stream(chunk).unwrap();
    assert!(out.contains("content_block_delta"));
    assert!(out.contains("\"text\":\"hi\""));
}

#[test]
fn done_sentinel_alone_yields_none() {
    assert!(OpenAiCompatAdapter.transform_stream("data: [DONE]\n\n").is_none());
}

#[test]
fn malformed_chunks_are_dropped_not_fatal() {
    assert!(OpenAiCompatAdapter.transform_stream("data: {broken\n\n").is_none());
    assert!(OpenAiCompatAdapter.transform_stream(": keep-alive\n\n").is_none());
}

#[test]
fn chunk_without_delta_content_yields_none() {
    let chunk = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"index\":0}]}\n\n";
    assert!(OpenAiCompatAdapter.transform_stream(chunk).is_none());
}
