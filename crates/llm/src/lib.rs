//! The relay's translation core: dialect endpoints, the upstream client
//! and the streaming state machine between them.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    extract::{Json, State},
    response::{IntoResponse, Sse, sse::Event},
    routing::{get, post},
};
use futures::StreamExt;

mod error;
mod finalize;
mod http_client;
mod messages;
mod metrics;
mod server;
mod transform;
mod translate;
mod upstream;

#[cfg(test)]
mod tests;

pub use error::{AnthropicResult, LlmError, LlmResult as Result};
pub use metrics::MetricsSnapshot;
pub use server::LlmHandler;

use error::AnthropicErrorResponse;
use messages::{anthropic, openai};
use translate::{
    anthropic::AnthropicEncoder,
    openai::{OpenAiEncoder, OpenAiStreamItem},
};

/// Build the shared request handler from the startup configuration.
pub fn build_handler(config: &config::Config) -> Arc<LlmHandler> {
    Arc::new(LlmHandler::new(config))
}

/// Creates the axum router for the dialect endpoints.
pub fn router(handler: Arc<LlmHandler>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/messages", post(anthropic_messages))
        .route("/v1/models", get(list_models))
        .with_state(handler)
}

/// Handle OpenAI chat completion requests.
///
/// With `stream: true` the response is sent as Server-Sent Events, closing
/// with a literal `data: [DONE]` line. Otherwise the streamed output is
/// aggregated into a single JSON body.
async fn chat_completions(
    State(handler): State<Arc<LlmHandler>>,
    Json(request): Json<openai::ChatCompletionRequest>,
) -> Result<impl IntoResponse> {
    log::debug!(
        "chat completions: model={}, messages={}, stream={}",
        request.model,
        request.messages.len(),
        request.stream.unwrap_or(false)
    );

    let streaming = request.stream.unwrap_or(false);
    let model = request.model.clone();
    let upstream_request = transform::from_openai(request, &handler.config.upstream);

    if streaming {
        let events = handler.stream(upstream_request).await?;
        let mut encoder = OpenAiEncoder::new(model);

        let sse = events
            .flat_map(move |event| futures::stream::iter(encoder.encode(event)))
            .map(|item| {
                let json = match &item {
                    OpenAiStreamItem::Chunk(chunk) => serde_json::to_string(chunk),
                    OpenAiStreamItem::Error(body) => serde_json::to_string(body),
                }
                .unwrap_or_else(|e| {
                    log::error!("failed to serialize chunk: {e}");
                    r#"{"error":"serialization failed"}"#.to_string()
                });

                Ok::<_, Infallible>(Event::default().data(json))
            })
            .chain(futures::stream::once(async {
                Ok::<_, Infallible>(Event::default().data("[DONE]"))
            }));

        Ok(Sse::new(sse).into_response())
    } else {
        let started = std::time::Instant::now();
        let response = handler.complete(upstream_request).await?;

        if handler.config.server.perf_monitoring {
            log::info!("chat completion served in {:?}", started.elapsed());
        }

        let body = response.to_openai(model, handler.config.upstream.reasoning_mode);

        Ok(Json(body).into_response())
    }
}

/// Handle Anthropic messages requests.
///
/// Streaming responses emit typed events as `event: <type>` / `data:`
/// line pairs in the fixed envelope order; there is no `[DONE]` marker.
async fn anthropic_messages(
    State(handler): State<Arc<LlmHandler>>,
    Json(request): Json<anthropic::MessagesRequest>,
) -> AnthropicResult<impl IntoResponse> {
    log::debug!(
        "anthropic messages: model={}, messages={}, stream={}",
        request.model,
        request.messages.len(),
        request.stream.unwrap_or(false)
    );

    let streaming = request.stream.unwrap_or(false);
    let model = request.model.clone();
    let upstream_request = transform::from_anthropic(request, &handler.config.upstream);

    if streaming {
        let events = handler
            .stream(upstream_request)
            .await
            .map_err(AnthropicErrorResponse::from)?;

        let mut encoder = AnthropicEncoder::new(model);

        let sse = events
            .flat_map(move |event| futures::stream::iter(encoder.encode(event)))
            .map(|event| {
                let json = serde_json::to_string(&event).unwrap_or_else(|e| {
                    log::error!("failed to serialize Anthropic event: {e}");
                    r#"{"type":"error","error":{"type":"internal_error","message":"serialization failed"}}"#
                        .to_string()
                });

                Ok::<_, Infallible>(Event::default().event(event.event_name()).data(json))
            });

        Ok(Sse::new(sse).into_response())
    } else {
        let started = std::time::Instant::now();
        let response = handler
            .complete(upstream_request)
            .await
            .map_err(AnthropicErrorResponse::from)?;

        if handler.config.server.perf_monitoring {
            log::info!("anthropic message served in {:?}", started.elapsed());
        }

        Ok(Json(response.to_anthropic(model)).into_response())
    }
}

/// Handle list models requests, served from the TTL cache.
async fn list_models(State(handler): State<Arc<LlmHandler>>) -> Result<impl IntoResponse> {
    let response = handler.models().await?;

    log::debug!("returning {} models", response.data.len());
    Ok(Json(response))
}
