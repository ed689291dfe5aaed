use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Anthropic-style message request. This is the canonical shape every
/// inbound request is parsed into before any vendor adaptation happens.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaudeNativeRequest {
    pub model: String,
    pub messages: Vec<ClaudeNativeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, deserialize_with = "deserialize_system_field")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ClaudeNativeTool>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaudeNativeMessage {
    pub role: String, // "user" or "assistant"
    #[serde(deserialize_with = "deserialize_content")]
    pub content: Vec<ClaudeNativeContentBlock>,
}

/// Content block union. Blocks with an unrecognized `type` deserialize into
/// the `Unknown` variant and are skipped by every consumer instead of
/// failing the whole request.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ClaudeNativeContentBlock {
    Text {
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    Image {
        source: ClaudeImageSource,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaudeImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaudeNativeTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SystemBlock {
    pub r#type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<Value>,
}

/// Anthropic-style message response, produced by the adapters when the
/// upstream answered in another format.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaudeNativeResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub role: String,
    pub content: Vec<ClaudeNativeContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: ClaudeNativeUsage,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ClaudeNativeUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// Claude clients send `content` either as a bare string or as an array of
// typed blocks; normalize both to the block list.
fn deserialize_content<'de, D>(deserializer: D) -> Result<Vec<ClaudeNativeContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ContentInput {
        String(String),
        Array(Vec<ClaudeNativeContentBlock>),
    }

    match ContentInput::deserialize(deserializer)? {
        ContentInput::String(text) => Ok(vec![ClaudeNativeContentBlock::Text { text }]),
        ContentInput::Array(blocks) => Ok(blocks),
    }
}

// `system` is either a plain string or an array of system blocks; only the
// text is carried forward.
fn deserialize_system_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SystemInput {
        String(String),
        Array(Vec<SystemBlock>),
    }

    match Option::<SystemInput>::deserialize(deserializer)? {
        Some(SystemInput::String(s)) => Ok(Some(s)),
        Some(SystemInput::Array(blocks)) => Ok(blocks.first().map(|b| b.text.clone())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_content_becomes_single_text_block() {
        let req: ClaudeNativeRequest = serde_json::from_value(json!({
            "model": "claude-3-5-sonnet",
            "messages": [{"role": "user", "content": "hello"}]
        }))
        .unwrap();
        assert_eq!(req.messages.len(), 1);
        match &req.messages[0].content[0] {
            ClaudeNativeContentBlock::Text { text } => assert_eq!(text, "hello"),
            other => panic!("expected text block, got {:?}", other),
        }
    }

    #[test]
    fn unknown_block_type_is_not_fatal() {
        let req: ClaudeNativeRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "a"},
                {"type": "server_tool_use", "id": "x", "name": "search"}
            ]}]
        }))
        .unwrap();
        assert!(matches!(
            req.messages[0].content[1],
            ClaudeNativeContentBlock::Unknown
        ));
    }

    #[test]
    fn system_accepts_string_and_block_array() {
        let req: ClaudeNativeRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [],
            "system": "be brief"
        }))
        .unwrap();
        assert_eq!(req.system.as_deref(), Some("be brief"));

        let req: ClaudeNativeRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [],
            "system": [{"type": "text", "text": "be brief"}]
        }))
        .unwrap();
        assert_eq!(req.system.as_deref(), Some("be brief"));
    }
}
