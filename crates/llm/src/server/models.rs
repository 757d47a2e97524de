use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::{error::LlmResult, messages::openai::Model, metrics::RelayMetrics, upstream::UpstreamClient};

#[derive(Clone, Debug)]
struct CachedModels {
    models: Vec<Model>,
    cached_at: Instant,
}

/// TTL cache over the upstream model catalogue.
pub(crate) struct ModelCatalogue {
    ttl: Duration,
    cache: RwLock<Option<CachedModels>>,
    metrics: Arc<RelayMetrics>,
}

impl ModelCatalogue {
    pub(crate) fn new(ttl: Duration, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            ttl,
            cache: RwLock::new(None),
            metrics,
        }
    }

    /// The model list, refreshed from the upstream past the TTL.
    pub(crate) async fn get(&self, upstream: &UpstreamClient) -> LlmResult<Vec<Model>> {
        {
            let cache = self.cache.read().await;

            if let Some(cached) = cache.as_ref()
                && cached.cached_at.elapsed() < self.ttl
            {
                self.metrics.record_model_list_cache_hit();
                return Ok(cached.models.clone());
            }
        }

        // The write lock prevents a thundering herd of refreshes.
        let mut cache = self.cache.write().await;

        // Another request may have refreshed the list while we waited.
        if let Some(cached) = cache.as_ref()
            && cached.cached_at.elapsed() < self.ttl
        {
            self.metrics.record_model_list_cache_hit();
            return Ok(cached.models.clone());
        }

        match upstream.list_models().await {
            Ok(mut models) => {
                models.sort_by(|a, b| a.id.cmp(&b.id));

                *cache = Some(CachedModels {
                    models: models.clone(),
                    cached_at: Instant::now(),
                });

                Ok(models)
            }
            Err(e) => {
                // Serve a stale list over an error when one exists.
                if let Some(cached) = cache.as_ref() {
                    log::warn!("model list refresh failed, serving stale entries: {e}");
                    return Ok(cached.models.clone());
                }

                Err(e)
            }
        }
    }
}
