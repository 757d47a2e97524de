//! TTL cache configuration settings.

use std::time::Duration;

use crate::env;

/// TTL cache configuration settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long the upstream model list is served from cache.
    pub model_list_ttl: Duration,
    /// How long a fetched anonymous upstream token is reused.
    pub auth_token_ttl: Duration,
    /// How long a non-streaming completion is served from the content cache.
    pub content_ttl: Duration,
    /// Maximum number of entries in the content cache.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            model_list_ttl: Duration::from_secs(300),
            auth_token_ttl: Duration::from_secs(600),
            content_ttl: Duration::from_secs(60),
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            model_list_ttl: env::duration("GLM_RELAY_MODEL_LIST_TTL", defaults.model_list_ttl)?,
            auth_token_ttl: env::duration("GLM_RELAY_AUTH_TOKEN_TTL", defaults.auth_token_ttl)?,
            content_ttl: env::duration("GLM_RELAY_CONTENT_TTL", defaults.content_ttl)?,
            max_entries: env::parsed("GLM_RELAY_CACHE_MAX_ENTRIES", defaults.max_entries)?,
        })
    }
}
