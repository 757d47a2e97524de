//! Relay configuration structures, loaded from the process environment.
//!
//! Every setting is optional and carries a default; the full surface is
//! documented on the individual config structs. Variables share the
//! `GLM_RELAY_` prefix.

#![deny(missing_docs)]

mod auth;
mod cache;
mod env;
mod reasoning;
mod server;
mod upstream;

pub use auth::AuthConfig;
pub use cache::CacheConfig;
pub use reasoning::ReasoningMode;
pub use server::{CorsOrigins, ServerConfig};
pub use upstream::{UpstreamConfig, UserProfile};

/// Main configuration structure for the relay.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP server settings: listen address, timeouts, concurrency cap, CORS.
    pub server: ServerConfig,
    /// Upstream chat service settings: base URL, tokens, default model.
    pub upstream: UpstreamConfig,
    /// Inbound API key authentication settings.
    pub auth: AuthConfig,
    /// TTL cache settings for the model list, upstream token and content caches.
    pub cache: CacheConfig,
}

impl Config {
    /// Load the configuration from the process environment.
    ///
    /// Fails only on unparseable values; a missing variable always falls
    /// back to its default.
    pub fn from_env() -> anyhow::Result<Config> {
        Ok(Config {
            server: ServerConfig::from_env()?,
            upstream: UpstreamConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            cache: CacheConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        temp_env::with_vars_unset(
            [
                "GLM_RELAY_UPSTREAM_URL",
                "GLM_RELAY_LISTEN_ADDRESS",
                "GLM_RELAY_API_KEY",
                "GLM_RELAY_DEFAULT_MODEL",
                "GLM_RELAY_REASONING_MODE",
            ],
            || {
                let config = Config::from_env().unwrap();

                assert_eq!(config.upstream.base_url, "https://chat.z.ai");
                assert_eq!(config.upstream.default_model, "GLM-4.5");
                assert_eq!(config.upstream.reasoning_mode, ReasoningMode::Think);
                assert_eq!(config.server.listen_address.port(), 8080);
                assert!(!config.auth.enforced());
            },
        );
    }

    #[test]
    fn environment_overrides() {
        temp_env::with_vars(
            [
                ("GLM_RELAY_UPSTREAM_URL", Some("https://example.com")),
                ("GLM_RELAY_LISTEN_ADDRESS", Some("127.0.0.1:9999")),
                ("GLM_RELAY_REASONING_MODE", Some("raw")),
                ("GLM_RELAY_API_KEY", Some("sk-local-test")),
                ("GLM_RELAY_MAX_CONCURRENT_REQUESTS", Some("7")),
            ],
            || {
                let config = Config::from_env().unwrap();

                assert_eq!(config.upstream.base_url, "https://example.com");
                assert_eq!(config.server.listen_address.port(), 9999);
                assert_eq!(config.upstream.reasoning_mode, ReasoningMode::Raw);
                assert_eq!(config.server.max_concurrent_requests, 7);
                assert!(config.auth.enforced());
            },
        );
    }

    #[test]
    fn invalid_value_is_an_error() {
        temp_env::with_vars([("GLM_RELAY_LISTEN_ADDRESS", Some("not-an-address"))], || {
            let error = Config::from_env().unwrap_err().to_string();
            assert!(error.contains("GLM_RELAY_LISTEN_ADDRESS"));
        });
    }
}
