//! HTTP server configuration settings.

use std::net::SocketAddr;
use std::time::Duration;

use crate::env;

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Which origins the server accepts cross-origin requests from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CorsOrigins {
    /// Any origin is accepted.
    #[default]
    Any,
    /// Only the listed origins are accepted.
    List(Vec<String>),
}

/// HTTP server configuration settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address the server listens on.
    pub listen_address: SocketAddr,
    /// Enables verbose request/response logging.
    pub debug: bool,
    /// Wall-clock budget for a non-streaming request.
    pub request_timeout: Duration,
    /// Idle budget between upstream frames on a streaming request.
    pub stream_timeout: Duration,
    /// Open-to-close budget for a single tool call within a response.
    pub tool_call_timeout: Duration,
    /// Maximum number of requests served concurrently; overflow is rejected
    /// with 429.
    pub max_concurrent_requests: usize,
    /// Allowed CORS origins.
    pub cors_origins: CorsOrigins,
    /// Emit per-request latency lines at info level.
    pub perf_monitoring: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.parse().expect("valid default listen address"),
            debug: false,
            request_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(120),
            tool_call_timeout: Duration::from_secs(30),
            max_concurrent_requests: 100,
            cors_origins: CorsOrigins::Any,
            perf_monitoring: false,
        }
    }
}

impl ServerConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let cors_origins = match env::var("GLM_RELAY_CORS_ORIGINS") {
            Some(value) if value.trim() == "*" => CorsOrigins::Any,
            Some(value) => CorsOrigins::List(
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            ),
            None => CorsOrigins::Any,
        };

        Ok(Self {
            listen_address: env::parsed("GLM_RELAY_LISTEN_ADDRESS", defaults.listen_address)?,
            debug: env::flag("GLM_RELAY_DEBUG", defaults.debug)?,
            request_timeout: env::duration("GLM_RELAY_REQUEST_TIMEOUT", defaults.request_timeout)?,
            stream_timeout: env::duration("GLM_RELAY_STREAM_TIMEOUT", defaults.stream_timeout)?,
            tool_call_timeout: env::duration("GLM_RELAY_TOOL_CALL_TIMEOUT", defaults.tool_call_timeout)?,
            max_concurrent_requests: env::parsed(
                "GLM_RELAY_MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )?,
            cors_origins,
            perf_monitoring: env::flag("GLM_RELAY_PERF_MONITORING", defaults.perf_monitoring)?,
        })
    }
}
