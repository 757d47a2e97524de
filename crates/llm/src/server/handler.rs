use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{Semaphore, mpsc};

use crate::{
    error::{LlmError, LlmResult},
    finalize::{FinalResponse, Finalizer},
    messages::openai::{ModelsResponse, ObjectType},
    metrics::{MetricsSnapshot, RelayMetrics},
    translate::{StreamTranslator, TranslateEvent},
    upstream::{ChatRequest, UpstreamClient},
};

use super::{content_cache, content_cache::ContentCache, models::ModelCatalogue};

/// Capacity of the per-request frame-to-writer channel. A slow consumer
/// fills it and backpressure propagates to the upstream read.
const EVENT_BUFFER: usize = 64;

/// Stream of translate events produced by one request's pump task.
pub(crate) type EventStream = futures::stream::BoxStream<'static, TranslateEvent>;

/// Per-request service handle: owns the upstream client, the caches, the
/// concurrency cap and the metrics. Built once at startup and shared.
pub struct LlmHandler {
    pub(crate) config: config::Config,
    upstream: UpstreamClient,
    models: ModelCatalogue,
    content_cache: ContentCache,
    permits: Arc<Semaphore>,
    metrics: Arc<RelayMetrics>,
}

/// Decrements the active-request gauge when a request's pipeline ends.
struct ActiveRequest(Arc<RelayMetrics>);

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.0.request_finished();
    }
}

impl LlmHandler {
    pub(crate) fn new(config: &config::Config) -> Self {
        let metrics = Arc::new(RelayMetrics::default());

        Self {
            config: config.clone(),
            upstream: UpstreamClient::new(config, metrics.clone()),
            models: ModelCatalogue::new(config.cache.model_list_ttl, metrics.clone()),
            content_cache: ContentCache::new(config.cache.content_ttl, config.cache.max_entries),
            permits: Arc::new(Semaphore::new(config.server.max_concurrent_requests)),
            metrics,
        }
    }

    /// A point-in-time copy of the process counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The model list in OpenAI format, served from the TTL cache.
    pub(crate) async fn models(&self) -> LlmResult<ModelsResponse> {
        let data = self.models.get(&self.upstream).await?;

        Ok(ModelsResponse {
            object: ObjectType::List,
            data,
        })
    }

    /// Start a streaming completion: the upstream call plus a pump task
    /// feeding translate events through a bounded channel.
    ///
    /// Dropping the returned stream cancels the request; the pump observes
    /// the closed channel on its next send and aborts the upstream read.
    pub(crate) async fn stream(&self, request: ChatRequest) -> LlmResult<EventStream> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| LlmError::RateLimited("the relay is at its concurrent request cap".to_string()))?;

        self.metrics.record_request();
        let active = ActiveRequest(self.metrics.clone());

        let mut frames = match self.upstream.chat_stream(&request).await {
            Ok(frames) => frames,
            Err(e) => {
                drop(active);
                return Err(e);
            }
        };

        let mut translator = StreamTranslator::new(self.config.server.tool_call_timeout, self.metrics.clone());
        let (tx, rx) = mpsc::channel::<TranslateEvent>(EVENT_BUFFER);

        tokio::spawn(async move {
            let _permit = permit;
            let _active = active;

            while let Some(result) = frames.next().await {
                let (events, terminal) = match result {
                    Ok(frame) => {
                        let events = translator.on_frame(frame);
                        (events, translator.is_terminal())
                    }
                    Err(error) => (translator.on_upstream_error(error), true),
                };

                for event in events {
                    if tx.send(event).await.is_err() {
                        // Receiver gone: the caller disconnected.
                        return;
                    }
                }

                if terminal {
                    return;
                }
            }

            for event in translator.on_eof() {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) });

        Ok(Box::pin(stream))
    }

    /// Run a completion to the end for a non-streaming caller.
    ///
    /// Served from the content cache when an identical request completed
    /// recently. A timeout before any output may retry once.
    pub(crate) async fn complete(&self, request: ChatRequest) -> LlmResult<Arc<FinalResponse>> {
        let fingerprint = content_cache::fingerprint(&request);

        if let Some(hit) = self.content_cache.get(fingerprint) {
            self.metrics.record_content_cache_hit();
            log::debug!("serving completion from the content cache");
            return Ok(hit);
        }

        let response = match self.complete_once(&request).await {
            Err(LlmError::UpstreamTimeout(elapsed)) => {
                log::warn!("upstream timed out after {elapsed:?} with no output shipped, retrying once");
                self.complete_once(&request).await?
            }
            other => other?,
        };

        let response = Arc::new(response);
        self.content_cache.insert(fingerprint, response.clone());

        Ok(response)
    }

    async fn complete_once(&self, request: &ChatRequest) -> LlmResult<FinalResponse> {
        let prompt_chars = request.prompt_chars();
        let mut events = self.stream(request.clone()).await?;

        let collect = async {
            let mut finalizer = Finalizer::default();

            while let Some(event) = events.next().await {
                finalizer.push(event);
            }

            finalizer.into_response(prompt_chars)
        };

        match tokio::time::timeout(self.config.server.request_timeout, collect).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::UpstreamTimeout(self.config.server.request_timeout)),
        }
    }
}
