use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OpenAI chat-completions request body. Optional fields that stay `None`
/// after defaulting are stripped from the serialized body rather than sent
/// as `null`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OpenAIChatCompletionRequest {
    pub model: String,
    pub messages: Vec<OpenAIChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAITool>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OpenAIChatMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAITool {
    pub r#type: String,
    pub function: OpenAIFunctionDefinition,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIFunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    pub function: OpenAIFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OpenAIFunctionCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>, // JSON string
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<OpenAIChatCompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAIUsage>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIChatCompletionChoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub message: OpenAIChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OpenAIUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One streaming chunk (`chat.completion.chunk`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIChatCompletionStreamResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub choices: Vec<OpenAIStreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAIUsage>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIStreamChoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub delta: OpenAIChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}
