//! Input-token estimation for the local `count_tokens` shim.
//!
//! Backends reached through the proxy frequently do not implement the
//! token-counting endpoint, so the proxy answers it locally. Counting
//! prefers an exact BPE tokenizer when one can be constructed and otherwise
//! falls back to a character heuristic with a known ±20% error band.

use std::sync::Once;

use serde_json::Value;

use crate::constants::IMAGE_TOKEN_COST;
use crate::types::claude::{ClaudeNativeContentBlock, ClaudeNativeRequest};

static TOKENIZER_WARN: Once = Once::new();

/// Approximate token usage for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCount {
    pub input: u64,
    /// Cache accounting is not implemented; always 0.
    pub cache_creation: u64,
}

/// Per-string token counting strategy.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// Exact counter backed by tiktoken's cl100k_base vocabulary. cl100k is an
/// approximation for Claude-family models but tracks real counts far closer
/// than the character heuristic.
pub struct ExactTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

impl ExactTokenizer {
    pub fn load() -> Option<Self> {
        match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(Self { bpe }),
            Err(e) => {
                log::debug!("cl100k_base construction failed: {}", e);
                None
            }
        }
    }
}

impl Tokenizer for ExactTokenizer {
    fn count(&self, text: &str) -> u64 {
        self.bpe.encode_with_special_tokens(text).len() as u64
    }
}

/// Character heuristic: CJK ideographs average well under one character per
/// token while other scripts average roughly four, hence the asymmetric
/// divisors. Accuracy is ±20%; the divisors are part of the contract and
/// must not be "tuned".
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> u64 {
        let mut cjk = 0u64;
        let mut other = 0u64;
        for c in text.chars() {
            if ('\u{4e00}'..='\u{9fff}').contains(&c) {
                cjk += 1;
            } else {
                other += 1;
            }
        }
        if cjk == 0 && other == 0 {
            return 0;
        }
        (cjk as f64 / 0.7 + other as f64 / 4.0).ceil() as u64
    }
}

/// Picks the best available tokenizer once at service start. Falling back is
/// permanent for the process; the warning is emitted a single time rather
/// than per call.
pub fn select_tokenizer() -> Box<dyn Tokenizer> {
    match ExactTokenizer::load() {
        Some(exact) => Box::new(exact),
        None => {
            TOKENIZER_WARN.call_once(|| {
                log::warn!("exact tokenizer unavailable, using character heuristic (±20%)");
            });
            Box::new(HeuristicTokenizer)
        }
    }
}

/// Walks a request and sums the token cost of the system prompt, every
/// message content block, and every declared tool. Always succeeds; absent
/// fields contribute 0 and unknown content blocks are skipped.
pub fn estimate_request_tokens(req: &ClaudeNativeRequest, tokenizer: &dyn Tokenizer) -> TokenCount {
    let mut input = 0u64;

    if let Some(system) = &req.system {
        input += tokenizer.count(system);
    }

    for message in &req.messages {
        for block in &message.content {
            input += match block {
                ClaudeNativeContentBlock::Text { text } => tokenizer.count(text),
                ClaudeNativeContentBlock::ToolUse { name, input, .. } => {
                    tokenizer.count(name) + tokenizer.count(&input.to_string())
                }
                ClaudeNativeContentBlock::ToolResult { content, .. } => {
                    tokenizer.count(&stringify(content))
                }
                ClaudeNativeContentBlock::Image { .. } => IMAGE_TOKEN_COST,
                ClaudeNativeContentBlock::Thinking { thinking } => tokenizer.count(thinking),
                ClaudeNativeContentBlock::Unknown => 0,
            };
        }
    }

    if let Some(tools) = &req.tools {
        for tool in tools {
            input += tokenizer.count(&tool.name);
            if let Some(description) = &tool.description {
                input += tokenizer.count(description);
            }
            input += tokenizer.count(&tool.input_schema.to_string());
        }
    }

    TokenCount {
        input,
        cache_creation: 0,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> ClaudeNativeRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn heuristic_matches_documented_formula() {
        // 2 CJK + 2 ASCII: ceil(2/0.7 + 2/4.0) = ceil(3.357) = 4
        assert_eq!(HeuristicTokenizer.count("你好ab"), 4);
    }

    #[test]
    fn heuristic_empty_string_is_zero() {
        assert_eq!(HeuristicTokenizer.count(""), 0);
    }

    #[test]
    fn estimate_is_monotonic_in_input_size() {
        let short = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hello"}]
        }));
        let long = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hello world, again"}]
        }));
        let a = estimate_request_tokens(&short, &HeuristicTokenizer);
        let b = estimate_request_tokens(&long, &HeuristicTokenizer);
        assert!(b.input >= a.input);
    }

    #[test]
    fn image_blocks_charge_a_flat_cost() {
        let req = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "xx"}}
            ]}]
        }));
        let count = estimate_request_tokens(&req, &HeuristicTokenizer);
        assert_eq!(count.input, IMAGE_TOKEN_COST);
        assert_eq!(count.cache_creation, 0);
    }

    #[test]
    fn tool_definitions_and_tool_use_are_counted() {
        let bare = request(json!({"model": "m", "messages": []}));
        let with_tools = request(json!({
            "model": "m",
            "messages": [{"role": "assistant", "content": [
                {"type": "tool_use", "id": "t1", "name": "search", "input": {"query": "rust"}}
            ]}],
            "tools": [{
                "name": "search",
                "description": "Search the web",
                "input_schema": {"type": "object", "properties": {"query": {"type": "string"}}}
            }]
        }));
        assert_eq!(estimate_request_tokens(&bare, &HeuristicTokenizer).input, 0);
        assert!(estimate_request_tokens(&with_tools, &HeuristicTokenizer).input > 0);
    }

    #[test]
    fn unknown_blocks_contribute_nothing() {
        let req = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "mystery", "payload": "whatever this is"}
            ]}]
        }));
        assert_eq!(estimate_request_tokens(&req, &HeuristicTokenizer).input, 0);
    }

    #[test]
    fn tool_result_non_string_content_is_stringified() {
        let req = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": {"ok": true}}
            ]}]
        }));
        assert!(estimate_request_tokens(&req, &HeuristicTokenizer).input > 0);
    }
}
