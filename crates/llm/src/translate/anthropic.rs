use std::collections::HashMap;

use serde_json::json;

use crate::messages::anthropic::{
    AnthropicErrorDetails, AnthropicUsage, ContentDelta, MessageDeltaBody, Role, StopReason, StreamContentBlock,
    StreamEvent, StreamMessageStart,
};

use super::event::{FinishKind, TranslateEvent};

/// Encodes translate events as Anthropic typed streaming events.
///
/// Bookkeeping guarantees the envelope invariant: every
/// `content_block_delta` is emitted between the `content_block_start` and
/// `content_block_stop` of its index. Text and thinking blocks close before
/// the next block opens; tool blocks stay open until their call closes, so
/// interleaved argument deltas keep valid indices.
pub(crate) struct AnthropicEncoder {
    message_id: String,
    model: String,
    usage: AnthropicUsage,
    next_block_index: u32,
    /// The currently open text or thinking block, if any.
    open_block: Option<OpenBlock>,
    /// Block index per tool call ordinal.
    tool_blocks: HashMap<usize, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Thinking(u32),
    Text(u32),
}

impl AnthropicEncoder {
    pub(crate) fn new(model: String) -> Self {
        Self {
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model,
            usage: AnthropicUsage::default(),
            next_block_index: 0,
            open_block: None,
            tool_blocks: HashMap::new(),
        }
    }

    pub(crate) fn encode(&mut self, event: TranslateEvent) -> Vec<StreamEvent> {
        match event {
            TranslateEvent::MessageStart => vec![
                StreamEvent::MessageStart {
                    message: StreamMessageStart {
                        id: self.message_id.clone(),
                        message_type: "message".to_string(),
                        role: Role::Assistant,
                        content: Vec::new(),
                        model: self.model.clone(),
                        usage: AnthropicUsage::default(),
                    },
                },
                StreamEvent::Ping,
            ],

            TranslateEvent::ReasoningStart => {
                let index = self.start_block(OpenBlock::Thinking);

                vec![StreamEvent::ContentBlockStart {
                    index,
                    content_block: StreamContentBlock::Thinking {
                        thinking: String::new(),
                    },
                }]
            }

            TranslateEvent::ReasoningDelta(thinking) => {
                let Some(OpenBlock::Thinking(index)) = self.open_block else {
                    log::warn!("reasoning delta without an open thinking block, dropping");
                    return Vec::new();
                };

                vec![StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::ThinkingDelta { thinking },
                }]
            }

            TranslateEvent::ReasoningStop { signature, .. } => {
                let Some(OpenBlock::Thinking(index)) = self.open_block.take() else {
                    return Vec::new();
                };

                vec![
                    StreamEvent::ContentBlockDelta {
                        index,
                        delta: ContentDelta::SignatureDelta { signature },
                    },
                    StreamEvent::ContentBlockStop { index },
                ]
            }

            TranslateEvent::TextDelta(text) => {
                let mut events = Vec::new();

                let index = match self.open_block {
                    Some(OpenBlock::Text(index)) => index,
                    other => {
                        events.extend(self.close_block(other));
                        let index = self.start_block(OpenBlock::Text);

                        events.push(StreamEvent::ContentBlockStart {
                            index,
                            content_block: StreamContentBlock::Text { text: String::new() },
                        });

                        index
                    }
                };

                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::TextDelta { text },
                });

                events
            }

            TranslateEvent::ToolOpen { index, id, name } => {
                let current = self.open_block.take();
                let mut events = self.close_block(current);

                let block_index = self.next_block_index;
                self.next_block_index += 1;
                self.tool_blocks.insert(index, block_index);

                events.push(StreamEvent::ContentBlockStart {
                    index: block_index,
                    content_block: StreamContentBlock::ToolUse {
                        id,
                        name,
                        input: json!({}),
                    },
                });

                events
            }

            TranslateEvent::ToolArgsDelta { index, fragment } => {
                let Some(&block_index) = self.tool_blocks.get(&index) else {
                    log::warn!("argument delta for unknown tool call {index}, dropping");
                    return Vec::new();
                };

                vec![StreamEvent::ContentBlockDelta {
                    index: block_index,
                    delta: ContentDelta::InputJsonDelta { partial_json: fragment },
                }]
            }

            TranslateEvent::ToolClose { index } => {
                let Some(block_index) = self.tool_blocks.remove(&index) else {
                    return Vec::new();
                };

                vec![StreamEvent::ContentBlockStop { index: block_index }]
            }

            TranslateEvent::ToolError { index, kind, message } => {
                let mut events = vec![StreamEvent::Error {
                    error: AnthropicErrorDetails {
                        error_type: format!("tool_call_error.{}", kind.as_str()),
                        message,
                    },
                }];

                if let Some(block_index) = self.tool_blocks.remove(&index) {
                    events.push(StreamEvent::ContentBlockStop { index: block_index });
                }

                events
            }

            TranslateEvent::Usage(usage) => {
                self.usage = AnthropicUsage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                };

                Vec::new()
            }

            TranslateEvent::Finished(kind) => {
                let current = self.open_block.take();
                let mut events = self.close_block(current);

                let stop_reason = match kind {
                    FinishKind::Stop => StopReason::EndTurn,
                    FinishKind::ToolUse => StopReason::ToolUse,
                };

                events.push(StreamEvent::MessageDelta {
                    delta: MessageDeltaBody {
                        stop_reason: Some(stop_reason),
                        stop_sequence: None,
                    },
                    usage: self.usage,
                });
                events.push(StreamEvent::MessageStop);

                events
            }

            TranslateEvent::StreamError(error) => vec![StreamEvent::Error {
                error: AnthropicErrorDetails::from(&error),
            }],
        }
    }

    fn start_block(&mut self, kind: fn(u32) -> OpenBlock) -> u32 {
        let index = self.next_block_index;
        self.next_block_index += 1;
        self.open_block = Some(kind(index));
        index
    }

    fn close_block(&mut self, block: Option<OpenBlock>) -> Vec<StreamEvent> {
        match block {
            Some(OpenBlock::Thinking(index)) | Some(OpenBlock::Text(index)) => {
                self.open_block = None;
                vec![StreamEvent::ContentBlockStop { index }]
            }
            None => Vec::new(),
        }
    }
}
