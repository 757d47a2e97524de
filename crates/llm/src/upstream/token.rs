use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{
    error::{LlmError, LlmResult},
    metrics::RelayMetrics,
};

use super::headers::HeaderPool;

/// Bearer token source for upstream requests.
///
/// A configured token always wins. Without one, and with anonymous tokens
/// enabled, a visitor token is fetched from the upstream auth endpoint and
/// cached for the configured TTL with double-checked refresh.
pub(crate) struct TokenProvider {
    client: reqwest::Client,
    base_url: String,
    configured: Option<SecretString>,
    anonymous_enabled: bool,
    ttl: Duration,
    cache: RwLock<Option<CachedToken>>,
    metrics: Arc<RelayMetrics>,
}

struct CachedToken {
    token: SecretString,
    fetched_at: Instant,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

impl TokenProvider {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: String,
        configured: Option<SecretString>,
        anonymous_enabled: bool,
        ttl: Duration,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            client,
            base_url,
            configured,
            anonymous_enabled,
            ttl,
            cache: RwLock::new(None),
            metrics,
        }
    }

    /// The bearer token to attach to the next upstream request.
    pub(crate) async fn bearer(&self, headers: &HeaderPool) -> LlmResult<SecretString> {
        if let Some(token) = &self.configured {
            return Ok(token.clone());
        }

        if !self.anonymous_enabled {
            return Err(LlmError::UpstreamUnavailable(
                "no upstream token configured and anonymous tokens are disabled".to_string(),
            ));
        }

        {
            let cache = self.cache.read().await;

            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < self.ttl
            {
                self.metrics.record_token_cache_hit();
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another request may have refreshed the token while we waited for
        // the write lock.
        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.ttl
        {
            self.metrics.record_token_cache_hit();
            return Ok(cached.token.clone());
        }

        let token = self.fetch_anonymous(headers).await?;

        *cache = Some(CachedToken {
            token: token.clone(),
            fetched_at: Instant::now(),
        });

        Ok(token)
    }

    async fn fetch_anonymous(&self, headers: &HeaderPool) -> LlmResult<SecretString> {
        let url = format!("{}/api/v1/auths/", self.base_url);
        let builder = headers.apply(self.client.get(&url), &self.base_url);

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("anonymous token request failed: {e}")))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<empty response>".to_string());
            log::error!("anonymous token request returned {status}: {body}");

            return Err(LlmError::UpstreamUnavailable(format!(
                "anonymous token request returned {status}"
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("unreadable anonymous token response: {e}")))?;

        log::debug!("fetched a fresh anonymous upstream token");

        Ok(SecretString::from(auth.token))
    }
}
