use serde_json::{json, Value};
use uuid::Uuid;

use super::sse::Event;
use super::traits::{AdapterError, FormatAdapter, TransformedRequest};
use crate::constants::OPENAI_CHAT_COMPLETIONS_PATH;
use crate::store::VendorConfig;
use crate::types::claude::{
    ClaudeNativeContentBlock, ClaudeNativeRequest, ClaudeNativeResponse, ClaudeNativeUsage,
};
use crate::types::openai::{
    OpenAIChatCompletionRequest, OpenAIChatCompletionResponse,
    OpenAIChatCompletionStreamResponse, OpenAIChatMessage, OpenAIFunctionDefinition, OpenAITool,
};
use crate::vendor::{vendor_endpoints, ApiFormat};

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for OpenAI chat-completions compatible upstreams.
///
/// The outbound message conversion is lossy on purpose: only `text` blocks
/// survive, tool_use/tool_result/image blocks are dropped. Multi-turn
/// tool-using conversations proxied through an OpenAI-only backend lose that
/// context; this is a documented limitation of the translation, not a defect
/// to patch here.
pub struct OpenAiCompatAdapter;

impl FormatAdapter for OpenAiCompatAdapter {
    fn format(&self) -> ApiFormat {
        ApiFormat::OpenAI
    }

    fn transform_request(
        &self,
        req: &ClaudeNativeRequest,
        _raw_body: &Value,
        config: &VendorConfig,
    ) -> Result<TransformedRequest, AdapterError> {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        if let Some(system) = &req.system {
            messages.push(OpenAIChatMessage {
                role: Some("system".to_string()),
                content: Some(system.clone()),
                tool_calls: None,
            });
        }
        for message in &req.messages {
            let role = if message.role == "assistant" {
                "assistant"
            } else {
                "user"
            };
            let text = message
                .content
                .iter()
                .filter_map(|block| match block {
                    ClaudeNativeContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            messages.push(OpenAIChatMessage {
                role: Some(role.to_string()),
                content: Some(text),
                tool_calls: None,
            });
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|tool| OpenAITool {
                    r#type: "function".to_string(),
                    function: OpenAIFunctionDefinition {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.input_schema.clone(),
                    },
                })
                .collect()
        });

        // The configured model is what the upstream actually serves; the
        // inbound model name is a Claude identifier and only used when no
        // backend model is configured.
        let model = if config.model.is_empty() {
            req.model.clone()
        } else {
            config.model.clone()
        };

        let body = OpenAIChatCompletionRequest {
            model,
            messages,
            temperature: Some(req.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: Some(req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            stream: Some(req.stream.unwrap_or(false)),
            tools,
        };
        let body =
            serde_json::to_value(&body).map_err(|e| AdapterError::Internal(e.to_string()))?;

        let endpoint = vendor_endpoints(config.api_type)
            .openai_path
            .unwrap_or(OPENAI_CHAT_COMPLETIONS_PATH);
        let url = format!("{}{}", config.base_url.trim_end_matches('/'), endpoint);

        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            (
                "authorization".to_string(),
                format!("Bearer {}", config.api_key),
            ),
        ];
        if let Some(custom) = &config.custom_headers {
            for (name, value) in custom {
                headers.push((name.clone(), value.clone()));
            }
        }

        Ok(TransformedRequest { url, headers, body })
    }

    fn transform_response(&self, body: &[u8]) -> Result<Value, AdapterError> {
        let response: OpenAIChatCompletionResponse = serde_json::from_slice(body)
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(AdapterError::EmptyResponse)?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ClaudeNativeContentBlock::Text { text });
            }
        }
        if let Some(tool_calls) = choice.message.tool_calls {
            for call in tool_calls {
                let name = call.function.name.unwrap_or_default();
                let arguments = call.function.arguments.unwrap_or_else(|| "{}".to_string());
                // Unparseable arguments fail the whole response instead of
                // fabricating a tool_use block with broken input.
                let input: Value = serde_json::from_str(&arguments).map_err(|e| {
                    AdapterError::ToolArguments {
                        name: name.clone(),
                        error: e.to_string(),
                    }
                })?;
                let id = call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("toolu_{}", Uuid::new_v4().simple()));
                content.push(ClaudeNativeContentBlock::ToolUse { id, name, input });
            }
        }

        let usage = response
            .usage
            .map(|u| ClaudeNativeUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let id = if response.id.is_empty() {
            format!("msg_{}", Uuid::new_v4().simple())
        } else {
            response.id
        };

        let claude_response = ClaudeNativeResponse {
            id,
            response_type: "message".to_string(),
            role: "assistant".to_string(),
            content,
            model: response.model,
            stop_reason: Some(map_finish_reason(choice.finish_reason.as_deref())),
            usage,
        };
        serde_json::to_value(&claude_response).map_err(|e| AdapterError::Internal(e.to_string()))
    }

    fn reframes_stream(&self) -> bool {
        true
    }

    fn transform_stream(&self, chunk: &str) -> Option<String> {
        let mut out = String::new();
        for line in chunk.lines() {
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() || data == "[DONE]" {
                continue;
            }
            let parsed: OpenAIChatCompletionStreamResponse = match serde_json::from_str(data) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::debug!("dropping malformed stream chunk: {}", e);
                    continue;
                }
            };
            let Some(choice) = parsed.choices.first() else {
                continue;
            };
            if let Some(text) = &choice.delta.content {
                if !text.is_empty() {
                    let payload = json!({
                        "type": "content_block_delta",
                        "index": 0,
                        "delta": { "type": "text", "text": text }
                    });
                    out.push_str(
                        &Event::default()
                            .event("content_block_delta")
                            .data(payload.to_string())
                            .to_string(),
                    );
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

// Unmapped finish reasons (including tool_calls) collapse to end_turn.
fn map_finish_reason(reason: Option<&str>) -> String {
    match reason {
        Some("stop") => "end_turn",
        Some("length") => "max_tokens",
        Some("content_filter") => "end_turn",
        _ => "end_turn",
    }
    .to_string()
}
