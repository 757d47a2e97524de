use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body for the OpenAI Chat Completions API.
///
/// Unknown fields are captured in `extra` and forwarded untouched, so
/// callers relying on newer OpenAI parameters keep working.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    /// The model to use for the completion.
    pub model: String,

    /// The conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Whether to stream the response as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Controls randomness in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools available for the model to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Controls how the model uses tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    /// Any additional fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single message in an OpenAI conversation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: ChatRole,

    /// The message content. Either a plain string or an array of typed
    /// content parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool calls issued by the assistant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For `tool` role messages, the id of the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Message content, either a bare string or an array of content parts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multi-part content; only `text` parts carry forwardable text.
    Parts(Vec<Value>),
}

impl MessageContent {
    /// Flatten the content to plain text. Non-text parts are skipped.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// End-user message.
    User,
    /// Model reply.
    Assistant,
    /// Tool execution result.
    Tool,
}

/// Tool definition in OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// The tool type, always `function`.
    pub r#type: ToolType,

    /// The function declaration.
    pub function: FunctionDefinition,
}

/// The only tool type OpenAI defines today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    /// A callable function.
    Function,
}

/// Function declaration inside a tool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDefinition {
    /// The function name.
    pub name: String,

    /// Description of what the function does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the function parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// A completed tool call on an assistant message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCall {
    /// Unique identifier for this call.
    pub id: String,

    /// The tool type, always `function`.
    pub r#type: ToolType,

    /// The function invocation.
    pub function: FunctionCall,
}

/// Function name and serialized arguments of a completed tool call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionCall {
    /// The function name.
    pub name: String,

    /// The arguments as a JSON-encoded string.
    pub arguments: String,
}

/// Object type discriminators used across OpenAI response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    /// A full chat completion response.
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    /// One streamed chunk of a chat completion.
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
    /// A paginated list.
    #[serde(rename = "list")]
    List,
    /// A model description.
    #[serde(rename = "model")]
    Model,
}

/// The reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply.
    Stop,
    /// Token limit reached.
    Length,
    /// The model invoked one or more tools.
    ToolCalls,
    /// The reply was cut by a content filter.
    ContentFilter,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Length => f.write_str("length"),
            Self::ToolCalls => f.write_str("tool_calls"),
            Self::ContentFilter => f.write_str("content_filter"),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Sum of both.
    pub total_tokens: u32,
}

/// Response body for a non-streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    pub id: String,

    /// Always `chat.completion`.
    pub object: ObjectType,

    /// Unix timestamp of creation.
    pub created: u64,

    /// The model that generated the response.
    pub model: String,

    /// Completion choices; always exactly one.
    pub choices: Vec<ChatChoice>,

    /// Token usage statistics.
    pub usage: Usage,
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Index of this choice.
    pub index: u32,

    /// The generated message.
    pub message: ChatMessage,

    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

/// One streamed chunk of a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Identifier shared by all chunks of one completion.
    pub id: String,

    /// Always `chat.completion.chunk`.
    pub object: ObjectType,

    /// Unix timestamp of creation.
    pub created: u64,

    /// The model generating the response.
    pub model: String,

    /// Delta choices; always exactly one.
    pub choices: Vec<ChatChoiceDelta>,

    /// Usage statistics, present on the final chunk only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Delta variant of a completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoiceDelta {
    /// Index of this choice.
    pub index: u32,

    /// The incremental update.
    pub delta: ChatMessageDelta,

    /// Set on the final chunk only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental update to the assistant message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessageDelta {
    /// Present on the first chunk only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,

    /// Text to append to the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Reasoning text to append, streamed separately from the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    /// Incremental tool call updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamingToolCall>>,
}

/// Incremental tool call entry inside a streamed delta.
///
/// The first chunk for a call carries id, name and an empty arguments
/// string; subsequent chunks carry argument fragments only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamingToolCall {
    /// Opens a new call.
    Start {
        /// Ordinal of the call within the response.
        index: u32,
        /// Unique identifier for this call.
        id: String,
        /// The tool type, always `function`.
        r#type: ToolType,
        /// Function name with an empty arguments placeholder.
        function: FunctionStart,
    },
    /// Appends argument bytes to an open call.
    Delta {
        /// Ordinal of the call within the response.
        index: u32,
        /// The argument fragment.
        function: FunctionDelta,
    },
}

/// Function header on the opening chunk of a streamed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionStart {
    /// The function name.
    pub name: String,
    /// Always empty on the opening chunk.
    pub arguments: String,
}

/// Argument fragment on a follow-up chunk of a streamed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Bytes to append to the call's argument buffer.
    pub arguments: String,
}

/// Model information in OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// The model identifier.
    pub id: String,

    /// Always `model`.
    pub object: ObjectType,

    /// Unix timestamp when the model was created.
    pub created: u64,

    /// The organization owning the model.
    pub owned_by: String,
}

/// Response for listing available models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Always `list`.
    pub object: ObjectType,

    /// The available models.
    pub data: Vec<Model>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_request_fields_are_preserved() {
        let json = json!({
            "model": "GLM-4.5",
            "messages": [{"role": "user", "content": "Hi"}],
            "frequency_penalty": 0.5,
            "seed": 42
        });

        let request: ChatCompletionRequest = serde_json::from_value(json).unwrap();

        assert_eq!(request.extra.get("seed"), Some(&json!(42)));

        let round_tripped = serde_json::to_value(&request).unwrap();
        assert_eq!(round_tripped["frequency_penalty"], json!(0.5));
    }

    #[test]
    fn content_parts_flatten_to_text() {
        let content = MessageContent::Parts(vec![
            json!({"type": "text", "text": "Hello"}),
            json!({"type": "image_url", "image_url": {"url": "https://example.com/x.png"}}),
            json!({"type": "text", "text": "world"}),
        ]);

        assert_eq!(content.to_text(), "Hello\nworld");
    }

    #[test]
    fn streaming_tool_call_start_shape() {
        let start = StreamingToolCall::Start {
            index: 0,
            id: "call_1".to_string(),
            r#type: ToolType::Function,
            function: FunctionStart {
                name: "get_weather".to_string(),
                arguments: String::new(),
            },
        };

        let json = serde_json::to_value(&start).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["id"], "call_1");
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_weather");
        assert_eq!(json["function"]["arguments"], "");
    }

    #[test]
    fn chunk_omits_empty_fields() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-1".to_string(),
            object: ObjectType::ChatCompletionChunk,
            created: 1700000000,
            model: "GLM-4.5".to_string(),
            choices: vec![ChatChoiceDelta {
                index: 0,
                delta: ChatMessageDelta {
                    content: Some("Hello".to_string()),
                    ..Default::default()
                },
                finish_reason: None,
            }],
            usage: None,
        };

        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["choices"][0]["delta"]["content"], "Hello");
        assert!(json["choices"][0]["delta"].get("role").is_none());
        assert!(json["choices"][0].get("finish_reason").is_none());
        assert!(json.get("usage").is_none());
    }
}
