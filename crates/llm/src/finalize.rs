//! Response finalizer for non-streaming callers.
//!
//! Consumes the translate-event sequence to completion and composes one
//! response body per dialect: text deltas concatenate, tool calls collect
//! in order, and usage falls back to the `ceil(chars/4)` estimate when the
//! upstream supplied none.

use config::ReasoningMode;

use crate::{
    error::{LlmError, LlmResult},
    messages::{anthropic, openai},
    translate::{FinishKind, TranslateEvent, reasoning},
    upstream::UpstreamUsage,
};

/// A fully reassembled tool call.
#[derive(Debug, Clone)]
pub(crate) struct CompletedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub errored: bool,
}

/// Accumulator over one request's translate events.
#[derive(Debug, Default)]
pub(crate) struct Finalizer {
    text: String,
    reasoning: String,
    reasoning_signature: Option<String>,
    thought_seconds: u64,
    tool_calls: Vec<CompletedToolCall>,
    finish: Option<FinishKind>,
    usage: Option<UpstreamUsage>,
    error: Option<LlmError>,
}

/// The composed result of a completed stream.
#[derive(Debug)]
pub(crate) struct FinalResponse {
    pub text: String,
    pub reasoning: Option<String>,
    pub reasoning_signature: Option<String>,
    pub thought_seconds: u64,
    pub tool_calls: Vec<CompletedToolCall>,
    pub finish: FinishKind,
    pub usage: openai::Usage,
}

impl Finalizer {
    pub(crate) fn push(&mut self, event: TranslateEvent) {
        match event {
            TranslateEvent::MessageStart | TranslateEvent::ReasoningStart => {}

            TranslateEvent::ReasoningDelta(delta) => self.reasoning.push_str(&delta),

            TranslateEvent::ReasoningStop {
                signature,
                thought_seconds,
            } => {
                self.reasoning_signature = Some(signature);
                self.thought_seconds = thought_seconds;
            }

            TranslateEvent::TextDelta(delta) => self.text.push_str(&delta),

            TranslateEvent::ToolOpen { id, name, .. } => self.tool_calls.push(CompletedToolCall {
                id,
                name,
                arguments: String::new(),
                errored: false,
            }),

            TranslateEvent::ToolArgsDelta { index, fragment } => {
                if let Some(call) = self.tool_calls.get_mut(index) {
                    call.arguments.push_str(&fragment);
                }
            }

            TranslateEvent::ToolClose { .. } => {}

            TranslateEvent::ToolError { index, message, .. } => {
                log::warn!("tool call {index} errored in a non-streaming response: {message}");

                if let Some(call) = self.tool_calls.get_mut(index) {
                    call.errored = true;
                }
            }

            TranslateEvent::Usage(usage) => self.usage = Some(usage),

            TranslateEvent::Finished(kind) => {
                // Exactly one terminator arrives per stream; keep the first.
                self.finish.get_or_insert(kind);
            }

            TranslateEvent::StreamError(error) => {
                self.error.get_or_insert(error);
            }
        }
    }

    /// Compose the final response. A terminal stream error before any
    /// terminator propagates as the request error.
    pub(crate) fn into_response(self, prompt_chars: usize) -> LlmResult<FinalResponse> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let finish = self.finish.unwrap_or(FinishKind::Stop);

        let usage = match self.usage {
            Some(usage) => openai::Usage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
            None => {
                let output_chars = self.text.chars().count() + self.reasoning.chars().count();
                let prompt_tokens = (prompt_chars.div_ceil(4)) as u32;
                let completion_tokens = (output_chars.div_ceil(4)) as u32;

                openai::Usage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                }
            }
        };

        Ok(FinalResponse {
            text: self.text,
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            reasoning_signature: self.reasoning_signature,
            thought_seconds: self.thought_seconds,
            tool_calls: self.tool_calls,
            finish,
            usage,
        })
    }
}

impl FinalResponse {
    /// Compose the OpenAI response body. Rendered reasoning merges into the
    /// message content ahead of the reply text.
    pub(crate) fn to_openai(&self, model: String, mode: ReasoningMode) -> openai::ChatCompletionResponse {
        let content = match &self.reasoning {
            Some(reasoning_text) => {
                let rendered = reasoning::render(reasoning_text, mode, self.thought_seconds);

                if self.text.is_empty() {
                    rendered
                } else {
                    format!("{rendered}\n\n{}", self.text)
                }
            }
            None => self.text.clone(),
        };

        let tool_calls: Vec<openai::ToolCall> = self
            .tool_calls
            .iter()
            .filter(|call| !call.errored)
            .map(|call| openai::ToolCall {
                id: call.id.clone(),
                r#type: openai::ToolType::Function,
                function: openai::FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect();

        let finish_reason = match self.finish {
            FinishKind::Stop => openai::FinishReason::Stop,
            FinishKind::ToolUse => openai::FinishReason::ToolCalls,
        };

        openai::ChatCompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: openai::ObjectType::ChatCompletion,
            created: crate::translate::openai::unix_timestamp(),
            model,
            choices: vec![openai::ChatChoice {
                index: 0,
                message: openai::ChatMessage {
                    role: openai::ChatRole::Assistant,
                    content: (!content.is_empty()).then(|| openai::MessageContent::Text(content)),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: None,
                },
                finish_reason,
            }],
            usage: self.usage,
        }
    }

    /// Compose the Anthropic response body. Reasoning becomes a native
    /// thinking block with its signature instead of merging into the text.
    pub(crate) fn to_anthropic(&self, model: String) -> anthropic::MessagesResponse {
        let mut content = Vec::new();

        if let Some(reasoning_text) = &self.reasoning {
            content.push(anthropic::ContentBlock::Thinking {
                thinking: reasoning_text.clone(),
                signature: self.reasoning_signature.clone(),
            });
        }

        if !self.text.is_empty() {
            content.push(anthropic::ContentBlock::Text {
                text: self.text.clone(),
            });
        }

        for call in self.tool_calls.iter().filter(|call| !call.errored) {
            let input = serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);

            content.push(anthropic::ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input,
            });
        }

        let stop_reason = match self.finish {
            FinishKind::Stop => anthropic::StopReason::EndTurn,
            FinishKind::ToolUse => anthropic::StopReason::ToolUse,
        };

        anthropic::MessagesResponse {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            r#type: "message".to_string(),
            role: anthropic::Role::Assistant,
            content,
            model,
            stop_reason: Some(stop_reason),
            stop_sequence: None,
            usage: anthropic::AnthropicUsage {
                input_tokens: self.usage.prompt_tokens,
                output_tokens: self.usage.completion_tokens,
            },
        }
    }
}
