use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for the Anthropic Messages API.
///
/// The format differs from OpenAI's in several key ways: the system prompt
/// lives outside the messages array, message content is an array of typed
/// blocks, and tool use has its own block types (`tool_use`/`tool_result`
/// instead of function calls).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagesRequest {
    /// The model to use for the completion, e.g. `claude-sonnet-4-20250514`.
    pub model: String,

    /// Maximum number of tokens to generate. Required by the Anthropic API.
    pub max_tokens: u32,

    /// The conversation messages, alternating between user and assistant.
    pub messages: Vec<Message>,

    /// System prompt, either a bare string or an array of text blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,

    /// Controls randomness in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Sequences that will cause the model to stop generating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Whether to stream the response as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Tools available for the model to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,

    /// Controls how the model uses tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

/// System prompt in either of the accepted shapes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// A bare string.
    Text(String),
    /// An array of content blocks; only text blocks carry forwardable text.
    Blocks(Vec<ContentBlock>),
}

impl SystemPrompt {
    /// Flatten the prompt to plain text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// An Anthropic message with role and content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,

    /// The message content, a bare string or an array of blocks.
    pub content: MessageContent,
}

/// Message content in either of the accepted shapes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// An array of typed content blocks.
    Blocks(Vec<ContentBlock>),
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user message.
    User,
    /// Model reply.
    Assistant,
}

/// A typed content block in an Anthropic message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// Model reasoning, rendered separately from the reply.
    #[serde(rename = "thinking")]
    Thinking {
        /// The reasoning text.
        thinking: String,
        /// Opaque signature attached when the reasoning was frozen.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Image content.
    #[serde(rename = "image")]
    Image {
        /// The image source.
        source: Value,
    },

    /// Tool invocation requested by the assistant.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Unique identifier for this invocation.
        id: String,
        /// Name of the tool.
        name: String,
        /// Input arguments as a JSON object.
        input: Value,
    },

    /// Result of a tool execution, sent by the caller.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// The `tool_use` id this result answers.
        tool_use_id: String,
        /// The result payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        /// Whether the execution failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Tool definition in Anthropic format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnthropicTool {
    /// The tool name.
    pub name: String,

    /// Description of what the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Response body for a non-streaming message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Unique identifier for this message.
    pub id: String,

    /// Always `message`.
    pub r#type: String,

    /// Always `assistant`.
    pub role: Role,

    /// The generated content blocks.
    pub content: Vec<ContentBlock>,

    /// The model that generated the response.
    pub model: String,

    /// Why generation stopped.
    pub stop_reason: Option<StopReason>,

    /// The stop sequence that triggered completion, if any.
    pub stop_sequence: Option<String>,

    /// Token usage statistics.
    pub usage: AnthropicUsage,
}

/// The reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the reply.
    EndTurn,
    /// Token limit reached.
    MaxTokens,
    /// A configured stop sequence was generated.
    StopSequence,
    /// The model invoked one or more tools.
    ToolUse,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndTurn => f.write_str("end_turn"),
            Self::MaxTokens => f.write_str("max_tokens"),
            Self::StopSequence => f.write_str("stop_sequence"),
            Self::ToolUse => f.write_str("tool_use"),
        }
    }
}

/// Token usage statistics in Anthropic format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnthropicUsage {
    /// Number of input tokens.
    pub input_tokens: u32,

    /// Number of output tokens.
    pub output_tokens: u32,
}

/// Error details in Anthropic format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicErrorDetails {
    /// The kind of error that occurred.
    #[serde(rename = "type")]
    pub error_type: String,

    /// Human-readable error message.
    pub message: String,
}

/// Streaming event types for Anthropic SSE responses.
///
/// Events for one response arrive in a fixed envelope order:
/// `message_start` → (`content_block_start`, `content_block_delta`*,
/// `content_block_stop`)* → `message_delta` → `message_stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Start of a message.
    #[serde(rename = "message_start")]
    MessageStart {
        /// The initial message metadata.
        message: StreamMessageStart,
    },

    /// A new content block begins.
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        /// Ordinal of the content block.
        index: u32,
        /// The block being started.
        content_block: StreamContentBlock,
    },

    /// Incremental update to the current content block.
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        /// Ordinal of the content block.
        index: u32,
        /// The delta payload.
        delta: ContentDelta,
    },

    /// The current content block is complete.
    #[serde(rename = "content_block_stop")]
    ContentBlockStop {
        /// Ordinal of the content block.
        index: u32,
    },

    /// Final message metadata: stop reason and usage.
    #[serde(rename = "message_delta")]
    MessageDelta {
        /// The metadata delta.
        delta: MessageDeltaBody,
        /// Final usage statistics.
        usage: AnthropicUsage,
    },

    /// End of the message stream.
    #[serde(rename = "message_stop")]
    MessageStop,

    /// Keep-alive event.
    #[serde(rename = "ping")]
    Ping,

    /// Error event; the stream continues only for recoverable tool errors.
    #[serde(rename = "error")]
    Error {
        /// The error details.
        error: AnthropicErrorDetails,
    },
}

impl StreamEvent {
    /// The SSE `event:` line name for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Ping => "ping",
            Self::Error { .. } => "error",
        }
    }
}

/// Initial message metadata for streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessageStart {
    /// Unique message id.
    pub id: String,

    /// Always `message`.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Always `assistant`.
    pub role: Role,

    /// Empty at start; populated through content block events.
    pub content: Vec<ContentBlock>,

    /// The model generating the response.
    pub model: String,

    /// Initial usage statistics.
    pub usage: AnthropicUsage,
}

/// Content block header sent in `content_block_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamContentBlock {
    /// A text block, empty at start.
    #[serde(rename = "text")]
    Text {
        /// Always empty at start.
        text: String,
    },

    /// A reasoning block, empty at start.
    #[serde(rename = "thinking")]
    Thinking {
        /// Always empty at start.
        thinking: String,
    },

    /// A tool invocation block.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Unique identifier for the invocation.
        id: String,
        /// Name of the tool.
        name: String,
        /// Always an empty object at start; built from JSON deltas.
        input: Value,
    },
}

/// Delta payload inside `content_block_delta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentDelta {
    /// Text to append to a text block.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// The text fragment.
        text: String,
    },

    /// Reasoning text to append to a thinking block.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// The reasoning fragment.
        thinking: String,
    },

    /// Signature attached when the thinking block freezes.
    #[serde(rename = "signature_delta")]
    SignatureDelta {
        /// The opaque signature value.
        signature: String,
    },

    /// Partial JSON for a tool_use block's input.
    #[serde(rename = "input_json_delta")]
    InputJsonDelta {
        /// The JSON fragment.
        partial_json: String,
    },
}

/// Metadata delta inside `message_delta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    /// Why generation stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,

    /// The stop sequence that triggered completion, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}
