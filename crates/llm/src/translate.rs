//! The streaming translation core.
//!
//! One [`StreamTranslator`] per request consumes upstream frames and emits
//! dialect-neutral [`TranslateEvent`]s, which the per-dialect encoders turn
//! into OpenAI chunks or Anthropic typed events. Transitions are driven by
//! the frame phase and the tool session state:
//!
//! ```text
//! INIT ──► STREAMING_THINK ──► POST_THINK_BRIDGE ──► STREAMING_ANSWER ──► DONE
//!   │                                                      ▲
//!   └─────────────► TOOL_CALL ─────────────────────────────┴──► DONE
//! ```

pub(crate) mod anthropic;
mod event;
pub(crate) mod openai;
pub(crate) mod reasoning;
mod tools;

use std::sync::Arc;
use std::time::Duration;

pub(crate) use event::{FinishKind, ToolErrorKind, TranslateEvent};

use crate::{
    error::LlmError,
    metrics::RelayMetrics,
    upstream::{Phase, UpstreamFrame},
};

use self::{reasoning::ReasoningBuffer, tools::ToolSession};

/// Marker closing the reasoning section inside an answer frame's
/// replacement content.
const REASONING_TERMINATOR: &str = "</details>\n";

/// Marker opening the tool terminator inside an `other` frame.
const TOOL_TERMINATOR_PREFIX: &str = "null,";

/// The state variable of the translation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseState {
    Init,
    StreamingAnswer,
    StreamingThink,
    PostThinkBridge,
    ToolCall,
    Done,
    Error,
}

/// Phase-driven engine translating upstream frames into outbound events.
///
/// Single-consumer, single-producer: exactly one task drives `on_frame`
/// per request, so no field needs synchronization.
pub(crate) struct StreamTranslator {
    state: ResponseState,
    reasoning: Option<ReasoningBuffer>,
    tools: ToolSession,
    metrics: Arc<RelayMetrics>,
}

impl StreamTranslator {
    pub(crate) fn new(tool_call_timeout: Duration, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            state: ResponseState::Init,
            reasoning: None,
            tools: ToolSession::new(tool_call_timeout),
            metrics,
        }
    }

    /// Translate one upstream frame. Frames after the terminal state are
    /// discarded.
    pub(crate) fn on_frame(&mut self, frame: UpstreamFrame) -> Vec<TranslateEvent> {
        if self.is_terminal() {
            return Vec::new();
        }

        let mut events = Vec::new();

        if self.state == ResponseState::Init {
            events.push(TranslateEvent::MessageStart);
            self.state = ResponseState::StreamingAnswer;
        }

        events.extend(self.tools.expire_overdue());

        if let Some(usage) = frame.usage {
            events.push(TranslateEvent::Usage(usage));
        }

        match frame.phase {
            Phase::Thinking => self.on_thinking(&frame, &mut events),
            Phase::Answer => self.on_answer(&frame, &mut events),
            Phase::ToolCall => self.on_tool_call(&frame, &mut events),
            Phase::Other => self.on_other(&frame, &mut events),
        }

        if frame.done && !self.is_terminal() {
            self.finish_into(&mut events);
        }

        events
    }

    /// The upstream stream ended without a `done` frame.
    pub(crate) fn on_eof(&mut self) -> Vec<TranslateEvent> {
        if self.is_terminal() {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.finish_into(&mut events);
        events
    }

    /// A terminal upstream error arrived on the frame channel.
    pub(crate) fn on_upstream_error(&mut self, error: LlmError) -> Vec<TranslateEvent> {
        if self.is_terminal() {
            return Vec::new();
        }

        self.state = ResponseState::Error;
        vec![TranslateEvent::StreamError(error)]
    }

    /// Whether the response reached DONE or ERROR; later frames are noise.
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self.state, ResponseState::Done | ResponseState::Error)
    }

    fn on_thinking(&mut self, frame: &UpstreamFrame, events: &mut Vec<TranslateEvent>) {
        let Some(delta) = frame.delta_content.as_deref().filter(|d| !d.is_empty()) else {
            return;
        };

        if let Some(buffer) = &self.reasoning
            && buffer.is_frozen()
        {
            // At most one reasoning block per response; late thinking
            // frames after the freeze are dropped.
            log::debug!("dropping thinking delta after the reasoning block froze");
            return;
        }

        if self.reasoning.is_none() {
            events.push(TranslateEvent::ReasoningStart);
        }

        let buffer = self.reasoning.get_or_insert_with(ReasoningBuffer::new);
        buffer.push(delta);
        events.push(TranslateEvent::ReasoningDelta(delta.to_string()));
        self.state = ResponseState::StreamingThink;
    }

    fn on_answer(&mut self, frame: &UpstreamFrame, events: &mut Vec<TranslateEvent>) {
        if self.state == ResponseState::StreamingThink
            && let Some(edit) = frame.edit_content.as_deref()
            && let Some(position) = edit.find(REASONING_TERMINATOR)
        {
            self.stop_reasoning(events);
            self.state = ResponseState::PostThinkBridge;

            let remainder = &edit[position + REASONING_TERMINATOR.len()..];

            if !remainder.is_empty() {
                self.emit_text(remainder, events);
            }
        }

        if let Some(delta) = frame.delta_content.as_deref().filter(|d| !d.is_empty()) {
            if self.state == ResponseState::StreamingThink {
                // Answer text arrived without a bridge frame; close the
                // reasoning block before emitting.
                self.stop_reasoning(events);
            }

            self.emit_text(delta, events);
        }
    }

    fn on_tool_call(&mut self, frame: &UpstreamFrame, events: &mut Vec<TranslateEvent>) {
        self.state = ResponseState::ToolCall;

        if let Some(edit) = frame.edit_content.as_deref() {
            events.extend(self.tools.ingest(edit));
        }
    }

    fn on_other(&mut self, frame: &UpstreamFrame, events: &mut Vec<TranslateEvent>) {
        let Some(edit) = frame.edit_content.as_deref() else {
            return;
        };

        if !edit.starts_with(TOOL_TERMINATOR_PREFIX) {
            return;
        }

        if !self.tools.any_active() {
            self.metrics.record_orphan_tool_terminator();
            log::debug!("tool terminator with no active calls, ignoring");
            return;
        }

        events.extend(self.tools.close_all());
        events.push(TranslateEvent::Finished(FinishKind::ToolUse));
        self.state = ResponseState::Done;
    }

    /// Emit reply text unless tool calls are active: the upstream's
    /// natural-language scaffolding around tool calls must never leak into
    /// the reply.
    fn emit_text(&mut self, text: &str, events: &mut Vec<TranslateEvent>) {
        if self.tools.any_active() {
            return;
        }

        events.push(TranslateEvent::TextDelta(text.to_string()));
        self.state = ResponseState::StreamingAnswer;
    }

    fn stop_reasoning(&mut self, events: &mut Vec<TranslateEvent>) {
        if let Some(buffer) = &mut self.reasoning
            && !buffer.is_frozen()
        {
            let signature = buffer.freeze();

            events.push(TranslateEvent::ReasoningStop {
                signature: signature.to_string(),
                thought_seconds: buffer.thought_seconds(),
            });
        }
    }

    /// Emit the single terminal event sequence for a successful response.
    fn finish_into(&mut self, events: &mut Vec<TranslateEvent>) {
        self.stop_reasoning(events);

        if self.tools.any_active() {
            events.extend(self.tools.close_all());
            events.push(TranslateEvent::Finished(FinishKind::ToolUse));
        } else {
            events.push(TranslateEvent::Finished(FinishKind::Stop));
        }

        self.state = ResponseState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamUsage;

    fn translator() -> StreamTranslator {
        StreamTranslator::new(Duration::from_secs(30), Arc::new(RelayMetrics::default()))
    }

    fn answer_delta(text: &str) -> UpstreamFrame {
        UpstreamFrame {
            phase: Phase::Answer,
            delta_content: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn thinking_delta(text: &str) -> UpstreamFrame {
        UpstreamFrame {
            phase: Phase::Thinking,
            delta_content: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn tool_frame(edit: &str) -> UpstreamFrame {
        UpstreamFrame {
            phase: Phase::ToolCall,
            edit_content: Some(edit.to_string()),
            ..Default::default()
        }
    }

    fn done_frame() -> UpstreamFrame {
        UpstreamFrame {
            done: true,
            ..Default::default()
        }
    }

    fn tool_block(id: &str, name: &str, arguments: serde_json::Value) -> String {
        format!(
            "<glm_block >{}</glm_block>",
            serde_json::json!({"type": "tool_call", "data": {"metadata": {"id": id, "name": name, "arguments": arguments}}})
        )
    }

    fn finish_kinds(events: &[TranslateEvent]) -> Vec<FinishKind> {
        events
            .iter()
            .filter_map(|event| match event {
                TranslateEvent::Finished(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_frame_opens_the_message() {
        let mut translator = translator();
        let events = translator.on_frame(answer_delta("Hi"));

        assert!(matches!(events[0], TranslateEvent::MessageStart));
        assert!(matches!(&events[1], TranslateEvent::TextDelta(t) if t == "Hi"));
    }

    #[test]
    fn plain_answer_stream_finishes_with_stop() {
        let mut translator = translator();
        let mut all = Vec::new();

        for delta in ["He", "llo", "!"] {
            all.extend(translator.on_frame(answer_delta(delta)));
        }
        all.extend(translator.on_frame(done_frame()));

        assert_eq!(finish_kinds(&all), vec![FinishKind::Stop]);

        let text: String = all
            .iter()
            .filter_map(|event| match event {
                TranslateEvent::TextDelta(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello!");
    }

    #[test]
    fn thinking_then_bridge_then_answer() {
        let mut translator = translator();
        let mut all = Vec::new();

        all.extend(translator.on_frame(thinking_delta("Let me ")));
        all.extend(translator.on_frame(thinking_delta("ponder")));

        let bridge = UpstreamFrame {
            phase: Phase::Answer,
            edit_content: Some("<details type=\"reasoning\" done=\"true\"></details>\n".to_string()),
            ..Default::default()
        };
        all.extend(translator.on_frame(bridge));
        all.extend(translator.on_frame(answer_delta("42")));
        all.extend(translator.on_frame(done_frame()));

        let starts = all
            .iter()
            .filter(|e| matches!(e, TranslateEvent::ReasoningStart))
            .count();
        let stops = all
            .iter()
            .filter(|e| matches!(e, TranslateEvent::ReasoningStop { .. }))
            .count();

        assert_eq!(starts, 1);
        assert_eq!(stops, 1);
        assert_eq!(finish_kinds(&all), vec![FinishKind::Stop]);
    }

    #[test]
    fn answer_text_is_suppressed_while_tools_are_active() {
        let mut translator = translator();
        let mut all = Vec::new();

        all.extend(translator.on_frame(tool_frame(&tool_block(
            "call_1",
            "get_weather",
            serde_json::json!({"city": "Beijing"}),
        ))));
        all.extend(translator.on_frame(answer_delta("Let me check the weather for you.")));

        assert!(
            !all.iter().any(|e| matches!(e, TranslateEvent::TextDelta(_))),
            "scaffolding text must not leak while tools are active"
        );

        let terminator = UpstreamFrame {
            phase: Phase::Other,
            edit_content: Some("null,".to_string()),
            ..Default::default()
        };
        all.extend(translator.on_frame(terminator));

        assert_eq!(finish_kinds(&all), vec![FinishKind::ToolUse]);
        assert!(all.iter().any(|e| matches!(e, TranslateEvent::ToolClose { index: 0 })));
    }

    #[test]
    fn orphan_tool_terminator_is_a_no_op() {
        let mut translator = translator();
        translator.on_frame(answer_delta("Hi"));

        let terminator = UpstreamFrame {
            phase: Phase::Other,
            edit_content: Some("null,".to_string()),
            ..Default::default()
        };
        let events = translator.on_frame(terminator);

        assert!(finish_kinds(&events).is_empty());

        let events = translator.on_frame(done_frame());
        assert_eq!(finish_kinds(&events), vec![FinishKind::Stop]);
    }

    #[test]
    fn frames_after_done_are_discarded() {
        let mut translator = translator();
        translator.on_frame(answer_delta("Hi"));
        let events = translator.on_frame(done_frame());
        assert_eq!(finish_kinds(&events), vec![FinishKind::Stop]);

        assert!(translator.on_frame(answer_delta("more")).is_empty());
        assert!(translator.on_frame(done_frame()).is_empty());
        assert!(translator.on_eof().is_empty());
    }

    #[test]
    fn eof_without_done_still_emits_one_terminator() {
        let mut translator = translator();
        translator.on_frame(answer_delta("Hi"));

        let events = translator.on_eof();
        assert_eq!(finish_kinds(&events), vec![FinishKind::Stop]);
        assert!(translator.on_eof().is_empty());
    }

    #[test]
    fn upstream_error_is_terminal() {
        let mut translator = translator();
        translator.on_frame(answer_delta("Hi"));

        let events = translator.on_upstream_error(LlmError::UpstreamTimeout(Duration::from_secs(120)));
        assert!(matches!(events[0], TranslateEvent::StreamError(_)));

        assert!(translator.on_frame(answer_delta("late")).is_empty());
    }

    #[test]
    fn usage_frames_update_the_buffered_usage() {
        let mut translator = translator();

        let frame = UpstreamFrame {
            phase: Phase::Other,
            usage: Some(UpstreamUsage {
                input_tokens: 12,
                output_tokens: 34,
            }),
            ..Default::default()
        };

        let events = translator.on_frame(frame);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, TranslateEvent::Usage(u) if u.output_tokens == 34))
        );
    }

    #[test]
    fn two_parallel_tool_calls_close_together() {
        let mut translator = translator();
        let frame_content = format!(
            "{}{}",
            tool_block("call_1", "get_weather", serde_json::json!({"city": "Beijing"})),
            tool_block("call_2", "get_time", serde_json::json!({"tz": "UTC"}))
        );

        let mut all = translator.on_frame(tool_frame(&frame_content));

        let terminator = UpstreamFrame {
            phase: Phase::Other,
            edit_content: Some("null,{\"usage\":{}}".to_string()),
            ..Default::default()
        };
        all.extend(translator.on_frame(terminator));

        let closes = all
            .iter()
            .filter(|e| matches!(e, TranslateEvent::ToolClose { .. }))
            .count();
        assert_eq!(closes, 2);
        assert_eq!(finish_kinds(&all), vec![FinishKind::ToolUse]);
    }
}
