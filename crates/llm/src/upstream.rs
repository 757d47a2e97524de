//! Client for the single upstream chat service.
//!
//! The upstream speaks its own SSE dialect: a POST to the chat endpoint
//! answers with `data:` frames whose nested `data` object is an
//! [`UpstreamFrame`]. Requests carry a rotating browser header set and a
//! bearer token that is either configured or fetched anonymously.

mod frame;
mod headers;
mod sse;
mod token;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

pub(crate) use frame::{Phase, UpstreamFrame, UpstreamUsage};
pub(crate) use sse::FrameStream;

use crate::{
    error::{LlmError, LlmResult},
    http_client::http_client,
    messages::openai,
    metrics::RelayMetrics,
};

use self::{headers::HeaderPool, token::TokenProvider};

/// Common-form chat request sent to the upstream.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    /// Upstream model name.
    pub model: String,
    /// Conversation after normalization; system messages are already
    /// coerced into the first user turn.
    pub messages: Vec<ChatTurn>,
    /// Always true on the wire; the relay aggregates for non-streaming
    /// callers itself.
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tool declarations in OpenAI function format, passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<openai::Tool>>,
}

impl ChatRequest {
    /// Total prompt characters, the basis of the usage estimate.
    pub(crate) fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|turn| turn.content.chars().count()).sum()
    }
}

/// One turn of the normalized conversation.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// Roles the upstream accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TurnRole {
    User,
    Assistant,
}

/// Client for the upstream chat service.
pub(crate) struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderPool,
    tokens: TokenProvider,
    stream_timeout: Duration,
    metrics: Arc<RelayMetrics>,
}

impl UpstreamClient {
    pub(crate) fn new(config: &config::Config, metrics: Arc<RelayMetrics>) -> Self {
        let client = http_client();
        let base_url = config.upstream.base_url.clone();

        let tokens = TokenProvider::new(
            client.clone(),
            base_url.clone(),
            config.upstream.token.clone(),
            config.upstream.anonymous_token,
            config.cache.auth_token_ttl,
            metrics.clone(),
        );

        Self {
            client,
            base_url,
            headers: HeaderPool::default(),
            tokens,
            stream_timeout: config.server.stream_timeout,
            metrics,
        }
    }

    /// POST a chat request and return the decoded frame sequence.
    pub(crate) async fn chat_stream(&self, request: &ChatRequest) -> LlmResult<FrameStream> {
        let url = format!("{}/api/chat/completions", self.base_url);
        let token = self.tokens.bearer(&self.headers).await?;

        let builder = self
            .headers
            .apply(self.client.post(&url), &self.base_url)
            .bearer_auth(token.expose_secret())
            .header("Accept", "text/event-stream")
            .json(request);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::UpstreamTimeout(self.stream_timeout)
            } else {
                LlmError::UpstreamUnavailable(format!("failed to reach upstream: {e}"))
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<empty response>".to_string());
            log::error!("upstream chat request returned {status}: {body}");

            return Err(match status.as_u16() {
                400 => LlmError::InvalidRequest(body),
                401 | 403 => LlmError::UpstreamUnavailable("upstream rejected the relay token".to_string()),
                429 => LlmError::RateLimited("upstream is rate limiting the relay".to_string()),
                _ => LlmError::UpstreamUnavailable(format!("upstream returned {status}")),
            });
        }

        Ok(sse::frames(response, self.stream_timeout, self.metrics.clone()))
    }

    /// Fetch the upstream model catalogue.
    pub(crate) async fn list_models(&self) -> LlmResult<Vec<openai::Model>> {
        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<UpstreamModel>,
        }

        #[derive(Deserialize)]
        struct UpstreamModel {
            id: String,
            #[serde(default)]
            created_at: Option<u64>,
            #[serde(default)]
            owned_by: Option<String>,
        }

        let url = format!("{}/api/models", self.base_url);
        let token = self.tokens.bearer(&self.headers).await?;

        let builder = self
            .headers
            .apply(self.client.get(&url), &self.base_url)
            .bearer_auth(token.expose_secret());

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("failed to fetch upstream models: {e}")))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<empty response>".to_string());
            log::error!("upstream models request returned {status}: {body}");

            return Err(LlmError::UpstreamUnavailable(format!(
                "upstream models request returned {status}"
            )));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("unreadable upstream models response: {e}")))?;

        Ok(models
            .data
            .into_iter()
            .map(|model| openai::Model {
                id: model.id,
                object: openai::ObjectType::Model,
                created: model.created_at.unwrap_or(0),
                owned_by: model.owned_by.unwrap_or_else(|| "z.ai".to_string()),
            })
            .collect())
    }
}
