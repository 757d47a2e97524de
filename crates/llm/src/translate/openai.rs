use crate::{
    error::ErrorResponse,
    messages::openai::{
        ChatChoiceDelta, ChatCompletionChunk, ChatMessageDelta, ChatRole, FinishReason, FunctionDelta, FunctionStart,
        ObjectType, StreamingToolCall, ToolType, Usage,
    },
};

use super::event::{FinishKind, TranslateEvent};

/// One item of the OpenAI SSE stream: a chunk or an in-stream error body.
#[derive(Debug)]
pub(crate) enum OpenAiStreamItem {
    Chunk(ChatCompletionChunk),
    Error(ErrorResponse),
}

/// Encodes translate events as OpenAI `chat.completion.chunk` objects.
///
/// All chunks of one response share the same id, creation timestamp and
/// model name.
pub(crate) struct OpenAiEncoder {
    id: String,
    model: String,
    created: u64,
    usage: Option<Usage>,
}

impl OpenAiEncoder {
    pub(crate) fn new(model: String) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model,
            created: unix_timestamp(),
            usage: None,
        }
    }

    pub(crate) fn encode(&mut self, event: TranslateEvent) -> Vec<OpenAiStreamItem> {
        match event {
            TranslateEvent::MessageStart => vec![self.chunk(
                ChatMessageDelta {
                    role: Some(ChatRole::Assistant),
                    ..Default::default()
                },
                None,
            )],

            TranslateEvent::ReasoningDelta(text) => vec![self.chunk(
                ChatMessageDelta {
                    reasoning_content: Some(text),
                    ..Default::default()
                },
                None,
            )],

            // Reasoning block boundaries have no OpenAI counterpart; the
            // reasoning itself streams through `reasoning_content`.
            TranslateEvent::ReasoningStart | TranslateEvent::ReasoningStop { .. } => Vec::new(),

            TranslateEvent::TextDelta(text) => vec![self.chunk(
                ChatMessageDelta {
                    content: Some(text),
                    ..Default::default()
                },
                None,
            )],

            TranslateEvent::ToolOpen { index, id, name } => vec![self.chunk(
                ChatMessageDelta {
                    tool_calls: Some(vec![StreamingToolCall::Start {
                        index: index as u32,
                        id,
                        r#type: ToolType::Function,
                        function: FunctionStart {
                            name,
                            arguments: String::new(),
                        },
                    }]),
                    ..Default::default()
                },
                None,
            )],

            TranslateEvent::ToolArgsDelta { index, fragment } => vec![self.chunk(
                ChatMessageDelta {
                    tool_calls: Some(vec![StreamingToolCall::Delta {
                        index: index as u32,
                        function: FunctionDelta { arguments: fragment },
                    }]),
                    ..Default::default()
                },
                None,
            )],

            TranslateEvent::ToolClose { .. } => Vec::new(),

            TranslateEvent::ToolError { index, kind, message } => {
                vec![OpenAiStreamItem::Error(ErrorResponse::tool_error(
                    format!("tool call {index} failed: {message}"),
                    kind.as_str(),
                ))]
            }

            TranslateEvent::Usage(usage) => {
                self.usage = Some(Usage {
                    prompt_tokens: usage.input_tokens,
                    completion_tokens: usage.output_tokens,
                    total_tokens: usage.input_tokens + usage.output_tokens,
                });

                Vec::new()
            }

            TranslateEvent::Finished(kind) => {
                let finish_reason = match kind {
                    FinishKind::Stop => FinishReason::Stop,
                    FinishKind::ToolUse => FinishReason::ToolCalls,
                };

                vec![self.chunk_with_usage(ChatMessageDelta::default(), Some(finish_reason), self.usage)]
            }

            TranslateEvent::StreamError(error) => vec![OpenAiStreamItem::Error(ErrorResponse::from(&error))],
        }
    }

    fn chunk(&self, delta: ChatMessageDelta, finish_reason: Option<FinishReason>) -> OpenAiStreamItem {
        self.chunk_with_usage(delta, finish_reason, None)
    }

    fn chunk_with_usage(
        &self,
        delta: ChatMessageDelta,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    ) -> OpenAiStreamItem {
        OpenAiStreamItem::Chunk(ChatCompletionChunk {
            id: self.id.clone(),
            object: ObjectType::ChatCompletionChunk,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChoiceDelta {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        })
    }
}

pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
