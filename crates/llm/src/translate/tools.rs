use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use super::event::{ToolErrorKind, TranslateEvent};

const OPEN_TAG: &str = "<glm_block >";
const CLOSE_TAG: &str = "</glm_block>";

/// Maximum characters per argument fragment emitted downstream.
const ARGS_FRAGMENT_CHARS: usize = 100;

/// Lifecycle state of one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolCallState {
    Open,
    Closed,
}

/// One tool invocation reassembled from upstream blocks, keyed by its
/// ordinal within the response.
#[derive(Debug)]
pub(crate) struct ToolCall {
    pub(crate) index: usize,
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) arguments_buffer: String,
    pub(crate) state: ToolCallState,
    opened_at: Instant,
}

/// Wire shape of one `<glm_block>` payload.
#[derive(Deserialize)]
struct BlockPayload {
    #[serde(rename = "type")]
    _type: Option<String>,
    data: BlockData,
}

#[derive(Deserialize)]
struct BlockData {
    metadata: BlockMetadata,
}

#[derive(Deserialize)]
struct BlockMetadata {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ordered tool calls of one response plus the unclosed-block buffer.
///
/// Created lazily on the first `tool_call` frame; closed by an `other`
/// frame whose content begins with `null,`.
#[derive(Debug)]
pub(crate) struct ToolSession {
    calls: Vec<ToolCall>,
    pending: String,
    call_timeout: Duration,
}

impl ToolSession {
    pub(crate) fn new(call_timeout: Duration) -> Self {
        Self {
            calls: Vec::new(),
            pending: String::new(),
            call_timeout,
        }
    }

    /// Whether any call is still open.
    pub(crate) fn any_active(&self) -> bool {
        self.calls.iter().any(|call| call.state == ToolCallState::Open)
    }

    /// Feed one `tool_call` frame's content into the assembler.
    ///
    /// Only blocks closed within the buffered text are processed; an
    /// unclosed trailing block stays buffered for the next frame.
    pub(crate) fn ingest(&mut self, edit_content: &str) -> Vec<TranslateEvent> {
        self.pending.push_str(edit_content);

        let mut events = Vec::new();

        loop {
            let Some(start) = self.pending.find(OPEN_TAG) else {
                break;
            };

            let inner_start = start + OPEN_TAG.len();

            let Some(inner_len) = self.pending[inner_start..].find(CLOSE_TAG) else {
                break;
            };

            let inner = self.pending[inner_start..inner_start + inner_len].to_string();
            self.pending.drain(..inner_start + inner_len + CLOSE_TAG.len());

            events.extend(self.process_block(&inner));
        }

        events
    }

    fn process_block(&mut self, inner: &str) -> Vec<TranslateEvent> {
        let payload: BlockPayload = match serde_json::from_str(inner) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("skipping undecodable tool block: {e}");
                return Vec::new();
            }
        };

        let metadata = payload.data.metadata;
        let index = self.calls.len();

        let id = metadata
            .id
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

        let mut events = vec![TranslateEvent::ToolOpen {
            index,
            id: id.clone(),
            name: metadata.name.clone(),
        }];

        let mut call = ToolCall {
            index,
            id,
            name: metadata.name,
            arguments_buffer: String::new(),
            state: ToolCallState::Open,
            opened_at: Instant::now(),
        };

        let canonical = serde_json::to_string(&metadata.arguments).unwrap_or_else(|_| "{}".to_string());

        for fragment in chunk_chars(&canonical, ARGS_FRAGMENT_CHARS) {
            call.arguments_buffer.push_str(&fragment);
            events.push(TranslateEvent::ToolArgsDelta { index, fragment });
        }

        self.calls.push(call);

        events
    }

    /// Close every open call, validating its reassembled arguments.
    ///
    /// Invalid argument buffers produce a [`TranslateEvent::ToolError`] for
    /// that call only; the remaining calls close normally.
    pub(crate) fn close_all(&mut self) -> Vec<TranslateEvent> {
        let mut events = Vec::new();

        for call in &mut self.calls {
            if call.state != ToolCallState::Open {
                continue;
            }

            call.state = ToolCallState::Closed;

            match serde_json::from_str::<Value>(&call.arguments_buffer) {
                Ok(_) => events.push(TranslateEvent::ToolClose { index: call.index }),
                Err(e) => events.push(TranslateEvent::ToolError {
                    index: call.index,
                    kind: ToolErrorKind::InvalidArguments,
                    message: format!("tool call arguments are not valid JSON: {e}"),
                }),
            }
        }

        events
    }

    /// Force-close calls that stayed open past the per-call timeout.
    pub(crate) fn expire_overdue(&mut self) -> Vec<TranslateEvent> {
        let timeout = self.call_timeout;
        let mut events = Vec::new();

        for call in &mut self.calls {
            if call.state == ToolCallState::Open && call.opened_at.elapsed() > timeout {
                call.state = ToolCallState::Closed;

                log::warn!("tool call {} ('{}') timed out after {timeout:?}", call.index, call.name);

                events.push(TranslateEvent::ToolError {
                    index: call.index,
                    kind: ToolErrorKind::Timeout,
                    message: format!("tool call stayed open past {timeout:?}"),
                });
            }
        }

        events
    }
}

/// Split a string into fragments of at most `max_chars` characters,
/// respecting character boundaries.
fn chunk_chars(text: &str, max_chars: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);

        if current.chars().count() == max_chars {
            fragments.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        fragments.push(current);
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(id: &str, name: &str, arguments: Value) -> String {
        format!(
            "{OPEN_TAG}{}{CLOSE_TAG}",
            json!({"type": "tool_call", "data": {"metadata": {"id": id, "name": name, "arguments": arguments}}})
        )
    }

    fn session() -> ToolSession {
        ToolSession::new(Duration::from_secs(30))
    }

    #[test]
    fn closed_block_opens_a_call_and_streams_arguments() {
        let mut session = session();
        let events = session.ingest(&block("call_1", "get_weather", json!({"city": "Beijing"})));

        let TranslateEvent::ToolOpen { index, id, name } = &events[0] else {
            unreachable!("expected a tool open event");
        };
        assert_eq!(*index, 0);
        assert_eq!(id, "call_1");
        assert_eq!(name, "get_weather");

        let reassembled: String = events
            .iter()
            .filter_map(|event| match event {
                TranslateEvent::ToolArgsDelta { fragment, .. } => Some(fragment.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(reassembled, r#"{"city":"Beijing"}"#);
        assert!(session.any_active());
    }

    #[test]
    fn unclosed_trailing_block_is_buffered_until_the_next_frame() {
        let mut session = session();
        let full = block("call_1", "get_weather", json!({"city": "Beijing"}));
        let (head, tail) = full.split_at(30);

        assert!(session.ingest(head).is_empty());
        assert!(!session.any_active());

        let events = session.ingest(tail);
        assert!(matches!(events[0], TranslateEvent::ToolOpen { .. }));
    }

    #[test]
    fn two_blocks_in_one_frame_get_sequential_indices() {
        let mut session = session();
        let frame = format!(
            "{}{}",
            block("call_1", "get_weather", json!({"city": "Beijing"})),
            block("call_2", "get_time", json!({"tz": "UTC"}))
        );

        let events = session.ingest(&frame);

        let indices: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                TranslateEvent::ToolOpen { index, .. } => Some(*index),
                _ => None,
            })
            .collect();

        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn long_arguments_are_chunked_to_at_most_100_chars() {
        let mut session = session();
        let long_value: String = "x".repeat(350);
        let events = session.ingest(&block("call_1", "write", json!({"content": long_value})));

        let fragments: Vec<&String> = events
            .iter()
            .filter_map(|event| match event {
                TranslateEvent::ToolArgsDelta { fragment, .. } => Some(fragment),
                _ => None,
            })
            .collect();

        assert!(fragments.len() > 1);
        assert!(fragments.iter().all(|f| f.chars().count() <= 100));

        let reassembled: String = fragments.iter().map(|f| f.as_str()).collect();
        let parsed: Value = serde_json::from_str(&reassembled).unwrap();
        assert_eq!(parsed["content"].as_str().unwrap().len(), 350);
    }

    #[test]
    fn close_all_validates_each_buffer() {
        let mut session = session();
        session.ingest(&block("call_1", "get_weather", json!({"city": "Beijing"})));

        let events = session.close_all();

        assert!(matches!(events[0], TranslateEvent::ToolClose { index: 0 }));
        assert!(!session.any_active());
    }

    #[test]
    fn missing_id_is_synthesized() {
        let mut session = session();
        let inner = json!({"type": "tool_call", "data": {"metadata": {"name": "get_weather", "arguments": {}}}});
        let events = session.ingest(&format!("{OPEN_TAG}{inner}{CLOSE_TAG}"));

        let TranslateEvent::ToolOpen { id, .. } = &events[0] else {
            unreachable!("expected a tool open event");
        };
        assert!(id.starts_with("call_"));
    }

    #[test]
    fn undecodable_block_is_skipped() {
        let mut session = session();
        let events = session.ingest(&format!("{OPEN_TAG}not json{CLOSE_TAG}"));

        assert!(events.is_empty());
        assert!(!session.any_active());
    }

    #[test]
    fn expired_call_is_force_closed_with_a_timeout_error() {
        let mut session = ToolSession::new(Duration::ZERO);
        session.ingest(&block("call_1", "slow_tool", json!({})));

        let events = session.expire_overdue();

        assert!(matches!(
            events[0],
            TranslateEvent::ToolError {
                index: 0,
                kind: ToolErrorKind::Timeout,
                ..
            }
        ));
        assert!(!session.any_active());
    }
}
