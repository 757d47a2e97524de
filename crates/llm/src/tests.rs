//! End-to-end tests over the translation pipeline: upstream frames in,
//! dialect bodies or event streams out.

use std::sync::Arc;
use std::time::Duration;

use config::ReasoningMode;
use serde_json::{Value, json};

use crate::{
    finalize::Finalizer,
    messages::anthropic::StreamEvent,
    metrics::RelayMetrics,
    translate::{
        StreamTranslator,
        anthropic::AnthropicEncoder,
        openai::{OpenAiEncoder, OpenAiStreamItem},
    },
    upstream::{Phase, UpstreamFrame, UpstreamUsage},
};

fn translator() -> StreamTranslator {
    StreamTranslator::new(Duration::from_secs(30), Arc::new(RelayMetrics::default()))
}

fn answer(text: &str) -> UpstreamFrame {
    UpstreamFrame {
        phase: Phase::Answer,
        delta_content: Some(text.to_string()),
        ..Default::default()
    }
}

fn thinking(text: &str) -> UpstreamFrame {
    UpstreamFrame {
        phase: Phase::Thinking,
        delta_content: Some(text.to_string()),
        ..Default::default()
    }
}

fn bridge() -> UpstreamFrame {
    UpstreamFrame {
        phase: Phase::Answer,
        edit_content: Some("<details type=\"reasoning\" done=\"true\"></details>\n".to_string()),
        ..Default::default()
    }
}

fn done() -> UpstreamFrame {
    UpstreamFrame {
        done: true,
        ..Default::default()
    }
}

fn tool_call_frame(blocks: &str) -> UpstreamFrame {
    UpstreamFrame {
        phase: Phase::ToolCall,
        edit_content: Some(blocks.to_string()),
        ..Default::default()
    }
}

fn tool_terminator() -> UpstreamFrame {
    UpstreamFrame {
        phase: Phase::Other,
        edit_content: Some("null,{\"usage\":{\"input_tokens\":0,\"output_tokens\":0}}".to_string()),
        ..Default::default()
    }
}

fn glm_block(id: &str, name: &str, arguments: Value) -> String {
    format!(
        "<glm_block >{}</glm_block>",
        json!({"type": "tool_call", "data": {"metadata": {"id": id, "name": name, "arguments": arguments}}})
    )
}

fn run_to_finalizer(frames: Vec<UpstreamFrame>) -> Finalizer {
    let mut translator = translator();
    let mut finalizer = Finalizer::default();

    for frame in frames {
        for event in translator.on_frame(frame) {
            finalizer.push(event);
        }
    }

    for event in translator.on_eof() {
        finalizer.push(event);
    }

    finalizer
}

fn run_to_openai_chunks(frames: Vec<UpstreamFrame>) -> Vec<Value> {
    let mut translator = translator();
    let mut encoder = OpenAiEncoder::new("GLM-4.5".to_string());
    let mut chunks = Vec::new();

    for frame in frames {
        for event in translator.on_frame(frame) {
            for item in encoder.encode(event) {
                match item {
                    OpenAiStreamItem::Chunk(chunk) => chunks.push(serde_json::to_value(&chunk).unwrap()),
                    OpenAiStreamItem::Error(body) => chunks.push(serde_json::to_value(&body).unwrap()),
                }
            }
        }
    }

    chunks
}

fn run_to_anthropic_events(frames: Vec<UpstreamFrame>) -> Vec<StreamEvent> {
    let mut translator = translator();
    let mut encoder = AnthropicEncoder::new("claude-sonnet-4-20250514".to_string());
    let mut events = Vec::new();

    for frame in frames {
        for event in translator.on_frame(frame) {
            events.extend(encoder.encode(event));
        }
    }

    events
}

#[test]
fn simple_echo_composes_hello() {
    let finalizer = run_to_finalizer(vec![answer("He"), answer("llo"), answer("!"), done()]);

    // Prompt "Hi" is 2 characters.
    let response = finalizer.into_response(2).unwrap();
    let body = response.to_openai("GLM-4.5".to_string(), ReasoningMode::Think);

    let content = body.choices[0].message.content.as_ref().unwrap().to_text();
    assert_eq!(content, "Hello!");
    assert_eq!(body.choices[0].finish_reason, crate::messages::openai::FinishReason::Stop);
    assert_eq!(body.usage.completion_tokens, 2, "ceil(6/4)");
}

#[test]
fn thinking_and_answer_render_in_think_mode() {
    let finalizer = run_to_finalizer(vec![
        thinking("Let me "),
        thinking("ponder"),
        bridge(),
        answer("42"),
        done(),
    ]);

    let response = finalizer.into_response(2).unwrap();
    let body = response.to_openai("GLM-4.5".to_string(), ReasoningMode::Think);

    let content = body.choices[0].message.content.as_ref().unwrap().to_text();
    assert_eq!(content, "🤔\n\nLet me ponder\n\n42");
}

#[test]
fn single_tool_call_stream_matches_the_openai_shape() {
    let chunks = run_to_openai_chunks(vec![
        tool_call_frame(&glm_block("call_1", "get_weather", json!({"city": "Beijing"}))),
        tool_terminator(),
    ]);

    // Opening chunk: role announcement.
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");

    // Tool open chunk with an empty arguments placeholder.
    let open = &chunks[1]["choices"][0]["delta"]["tool_calls"][0];
    assert_eq!(open["index"], 0);
    assert_eq!(open["id"], "call_1");
    assert_eq!(open["type"], "function");
    assert_eq!(open["function"]["name"], "get_weather");
    assert_eq!(open["function"]["arguments"], "");

    // Argument fragments reassemble byte-identically.
    let reassembled: String = chunks
        .iter()
        .skip(2)
        .filter_map(|chunk| {
            chunk["choices"][0]["delta"]["tool_calls"][0]["function"]["arguments"]
                .as_str()
                .map(str::to_string)
        })
        .collect();
    assert_eq!(reassembled, r#"{"city":"Beijing"}"#);

    // Final chunk carries the tool_calls finish reason.
    let last = chunks.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "tool_calls");

    // Exactly one finish reason across the stream.
    let finish_count = chunks
        .iter()
        .filter(|chunk| !chunk["choices"][0]["finish_reason"].is_null())
        .count();
    assert_eq!(finish_count, 1);
}

#[test]
fn two_parallel_tool_calls_reconstruct_cleanly() {
    let frame = format!(
        "{}{}",
        glm_block("call_1", "get_weather", json!({"city": "Beijing"})),
        glm_block("call_2", "get_time", json!({"tz": "Asia/Shanghai"}))
    );

    let finalizer = run_to_finalizer(vec![tool_call_frame(&frame), tool_terminator()]);
    let response = finalizer.into_response(10).unwrap();

    assert_eq!(response.tool_calls.len(), 2);
    assert_eq!(response.tool_calls[0].name, "get_weather");
    assert_eq!(response.tool_calls[0].arguments, r#"{"city":"Beijing"}"#);
    assert_eq!(response.tool_calls[1].name, "get_time");
    assert_eq!(response.tool_calls[1].arguments, r#"{"tz":"Asia/Shanghai"}"#);

    let body = response.to_anthropic("claude-sonnet-4-20250514".to_string());
    assert_eq!(
        body.stop_reason,
        Some(crate::messages::anthropic::StopReason::ToolUse)
    );
}

#[test]
fn anthropic_stream_produces_the_required_event_order() {
    let events = run_to_anthropic_events(vec![answer("Hel"), answer("lo"), done()]);

    let names: Vec<&str> = events
        .iter()
        .map(StreamEvent::event_name)
        .filter(|name| *name != "ping")
        .collect();

    assert_eq!(
        names,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );

    let StreamEvent::MessageDelta { delta, .. } = events
        .iter()
        .find(|event| event.event_name() == "message_delta")
        .unwrap()
    else {
        unreachable!("filtered on message_delta");
    };
    assert_eq!(
        delta.stop_reason,
        Some(crate::messages::anthropic::StopReason::EndTurn)
    );
}

#[test]
fn anthropic_deltas_stay_inside_their_envelopes() {
    let frames = vec![
        thinking("Let me ponder"),
        bridge(),
        answer("The answer "),
        answer("is 42."),
        tool_call_frame(&glm_block("call_1", "get_weather", json!({"city": "Beijing"}))),
        tool_terminator(),
    ];

    let events = run_to_anthropic_events(frames);

    let mut open_blocks = std::collections::HashSet::new();

    for event in &events {
        match event {
            StreamEvent::ContentBlockStart { index, .. } => {
                assert!(open_blocks.insert(*index), "block {index} started twice");
            }
            StreamEvent::ContentBlockDelta { index, .. } => {
                assert!(open_blocks.contains(index), "delta for block {index} outside its envelope");
            }
            StreamEvent::ContentBlockStop { index } => {
                assert!(open_blocks.remove(index), "block {index} stopped without starting");
            }
            _ => {}
        }
    }

    assert!(open_blocks.is_empty(), "blocks left open: {open_blocks:?}");
}

#[test]
fn scaffolding_answer_text_never_reaches_the_caller_during_tool_calls() {
    let chunks = run_to_openai_chunks(vec![
        tool_call_frame(&glm_block("call_1", "get_weather", json!({"city": "Beijing"}))),
        answer("Let me look that up for you."),
        tool_terminator(),
    ]);

    for chunk in &chunks {
        assert!(
            chunk["choices"][0]["delta"]["content"].is_null(),
            "content leaked: {chunk}"
        );
    }
}

#[test]
fn upstream_usage_beats_the_estimate_end_to_end() {
    let usage_frame = UpstreamFrame {
        phase: Phase::Other,
        usage: Some(UpstreamUsage {
            input_tokens: 7,
            output_tokens: 21,
        }),
        ..Default::default()
    };

    let finalizer = run_to_finalizer(vec![answer("Hello!"), usage_frame, done()]);
    let response = finalizer.into_response(1000).unwrap();

    assert_eq!(response.usage.prompt_tokens, 7);
    assert_eq!(response.usage.completion_tokens, 21);
}
