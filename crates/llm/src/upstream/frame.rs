use serde::Deserialize;

/// Phase tag carried by every upstream frame.
///
/// Unknown tags collapse into [`Phase::Other`] so new upstream phases never
/// break the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Model reasoning content.
    Thinking,
    /// Reply text.
    Answer,
    /// Tool invocation blocks.
    ToolCall,
    /// Everything else, including the tool terminator marker.
    #[default]
    #[serde(other)]
    Other,
}

/// One decoded SSE event from the upstream chat service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamFrame {
    /// Which phase this frame belongs to.
    #[serde(default)]
    pub phase: Phase,

    /// Incremental content to append.
    #[serde(default)]
    pub delta_content: Option<String>,

    /// Replacement content; carries the reasoning terminator and tool
    /// blocks.
    #[serde(default)]
    pub edit_content: Option<String>,

    /// Usage statistics, attached to late frames.
    #[serde(default)]
    pub usage: Option<UpstreamUsage>,

    /// Marks the last frame of the response.
    #[serde(default)]
    pub done: bool,
}

/// Usage statistics as reported by the upstream.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UpstreamUsage {
    /// Number of input tokens.
    #[serde(default)]
    pub input_tokens: u32,

    /// Number of output tokens.
    #[serde(default)]
    pub output_tokens: u32,
}

/// Wire envelope around each frame. The payload of a `data:` line is
/// `{"type": "...", "data": {<frame>}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct FrameEnvelope {
    pub(crate) data: UpstreamFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_thinking_frame() {
        let payload = r#"{"type":"chat:completion","data":{"phase":"thinking","delta_content":"Let me "}}"#;
        let envelope: FrameEnvelope = serde_json::from_str(payload).unwrap();

        assert_eq!(envelope.data.phase, Phase::Thinking);
        assert_eq!(envelope.data.delta_content.as_deref(), Some("Let me "));
        assert!(!envelope.data.done);
    }

    #[test]
    fn unknown_phase_collapses_to_other() {
        let payload = r#"{"data":{"phase":"telemetry","delta_content":"x"}}"#;
        let envelope: FrameEnvelope = serde_json::from_str(payload).unwrap();

        assert_eq!(envelope.data.phase, Phase::Other);
    }

    #[test]
    fn missing_phase_defaults_to_other() {
        let payload = r#"{"data":{"done":true,"usage":{"input_tokens":12,"output_tokens":34}}}"#;
        let envelope: FrameEnvelope = serde_json::from_str(payload).unwrap();

        assert_eq!(envelope.data.phase, Phase::Other);
        assert!(envelope.data.done);
        assert_eq!(envelope.data.usage.unwrap().output_tokens, 34);
    }
}
