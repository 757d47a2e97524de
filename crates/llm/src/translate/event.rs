use crate::{error::LlmError, upstream::UpstreamUsage};

/// Dialect-neutral event emitted by the translation state machine.
///
/// The per-dialect encoders turn these into OpenAI chunks or Anthropic
/// typed events; the finalizer folds them into a single response body.
#[derive(Debug)]
pub(crate) enum TranslateEvent {
    /// First event of every response.
    MessageStart,

    /// A reasoning block begins.
    ReasoningStart,

    /// Reasoning text to append.
    ReasoningDelta(String),

    /// The reasoning block froze. Carries the millisecond-timestamp
    /// signature and the elapsed thinking time.
    ReasoningStop {
        signature: String,
        thought_seconds: u64,
    },

    /// Reply text to append.
    TextDelta(String),

    /// A tool call opened.
    ToolOpen {
        index: usize,
        id: String,
        name: String,
    },

    /// Argument bytes for an open tool call.
    ToolArgsDelta {
        index: usize,
        fragment: String,
    },

    /// A tool call closed cleanly.
    ToolClose {
        index: usize,
    },

    /// A tool call failed; the rest of the stream proceeds.
    ToolError {
        index: usize,
        kind: ToolErrorKind,
        message: String,
    },

    /// Usage statistics reported by the upstream.
    Usage(UpstreamUsage),

    /// Terminal event of a successful response. Emitted exactly once.
    Finished(FinishKind),

    /// Terminal event of a failed stream.
    StreamError(LlmError),
}

/// Why a tool call was closed with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolErrorKind {
    /// The reassembled argument buffer is not valid JSON.
    InvalidArguments,
    /// The call stayed open past the per-call timeout.
    Timeout,
}

impl ToolErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::Timeout => "timeout",
        }
    }
}

/// How the response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinishKind {
    /// Natural end of the reply.
    Stop,
    /// The response carries tool calls.
    ToolUse,
}
