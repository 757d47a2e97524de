use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;

use crate::{
    error::{LlmError, LlmResult},
    metrics::RelayMetrics,
};

use super::frame::{FrameEnvelope, UpstreamFrame};

/// A finite sequence of decoded upstream frames.
pub(crate) type FrameStream = futures::stream::BoxStream<'static, LlmResult<UpstreamFrame>>;

struct ParserState<S> {
    events: S,
    skipped: u64,
    finished: bool,
    metrics: Arc<RelayMetrics>,
}

/// Turn the upstream HTTP body into a lazy sequence of [`UpstreamFrame`]s.
///
/// A `data: [DONE]` payload or the connection closing ends the sequence.
/// Malformed JSON payloads are skipped with a warning and a counter bump;
/// they are never fatal. Waiting longer than `idle_timeout` for the next
/// event yields a terminal [`LlmError::UpstreamTimeout`].
pub(crate) fn frames(response: reqwest::Response, idle_timeout: Duration, metrics: Arc<RelayMetrics>) -> FrameStream {
    let state = ParserState {
        events: response.bytes_stream().eventsource(),
        skipped: 0,
        finished: false,
        metrics,
    };

    let stream = futures::stream::unfold(state, move |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            match tokio::time::timeout(idle_timeout, state.events.next()).await {
                Err(_) => {
                    state.finished = true;
                    return Some((Err(LlmError::UpstreamTimeout(idle_timeout)), state));
                }
                Ok(None) => {
                    state.finished = true;

                    if state.skipped > 0 {
                        log::debug!("upstream stream ended, {} malformed frames skipped", state.skipped);
                    }

                    return None;
                }
                Ok(Some(Err(e))) => {
                    state.finished = true;
                    return Some((
                        Err(LlmError::UpstreamUnavailable(format!("upstream read failed: {e}"))),
                        state,
                    ));
                }
                Ok(Some(Ok(event))) => {
                    if event.data == "[DONE]" {
                        state.finished = true;
                        return None;
                    }

                    match serde_json::from_str::<FrameEnvelope>(&event.data) {
                        Ok(envelope) => return Some((Ok(envelope.data), state)),
                        Err(e) => {
                            state.skipped += 1;
                            state.metrics.record_malformed_frame();
                            log::warn!("skipping malformed upstream frame: {e}");
                        }
                    }
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::upstream::frame::Phase;

    async fn collect(body: &'static str) -> Vec<LlmResult<UpstreamFrame>> {
        let response = http::Response::builder()
            .header("content-type", "text/event-stream")
            .body(body)
            .unwrap();

        let response = reqwest::Response::from(response);
        frames(response, Duration::from_secs(5), Arc::new(RelayMetrics::default()))
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn parses_frames_and_stops_at_done() {
        let body = indoc! {r#"
            data: {"type":"chat:completion","data":{"phase":"answer","delta_content":"He"}}

            data: {"type":"chat:completion","data":{"phase":"answer","delta_content":"llo"}}

            data: [DONE]

            data: {"type":"chat:completion","data":{"phase":"answer","delta_content":"ignored"}}

        "#};

        let frames = collect(body).await;

        assert_eq!(frames.len(), 2);
        let first = frames[0].as_ref().unwrap();
        assert_eq!(first.phase, Phase::Answer);
        assert_eq!(first.delta_content.as_deref(), Some("He"));
    }

    #[tokio::test]
    async fn malformed_payloads_are_skipped() {
        let body = indoc! {r#"
            data: this is not json

            data: {"type":"chat:completion","data":{"phase":"answer","delta_content":"ok"}}

        "#};

        let frames = collect(body).await;

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().delta_content.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn non_data_lines_are_ignored() {
        let body = indoc! {r#"
            : keep-alive comment

            event: something
            data: {"data":{"phase":"answer","delta_content":"x"}}

        "#};

        let frames = collect(body).await;

        assert_eq!(frames.len(), 1);
    }
}
