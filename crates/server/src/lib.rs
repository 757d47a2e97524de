//! Relay server library.
//!
//! Provides a reusable serve function for the binary and for tests: route
//! wiring, the auth gate, CORS, the health and metrics endpoints, and
//! graceful shutdown.

#![deny(missing_docs)]

mod auth;
mod cors;
mod health;
mod logger;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{Router, routing::get};
use config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthLayer;

pub use logger::init_logger;

/// Configuration for serving the relay.
pub struct ServeConfig {
    /// The deserialized environment configuration.
    pub config: Config,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// The version string to log on startup.
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful if
    /// port 0 was specified).
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the relay server with the provided configuration.
pub async fn serve(
    ServeConfig {
        config,
        shutdown_signal,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    log::info!("GLM Relay {version}");

    let handler = llm::build_handler(&config);
    let app = router(&config, handler);

    let listen_address = config.server.listen_address;
    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        sender
            .send(listener.local_addr()?)
            .map_err(|_| anyhow!("Failed to send back bound address."))?;
    }

    log::info!("OpenAI endpoint: http://{listen_address}/v1/chat/completions");
    log::info!("Anthropic endpoint: http://{listen_address}/v1/messages");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
        _ = shutdown_signal.cancelled() => {
            log::info!("Received shutdown signal, shutting down gracefully...");
        }
    }

    Ok(())
}

/// Assemble the full application router.
///
/// The dialect endpoints sit behind the auth gate; health and metrics stay
/// open. CORS applies everywhere.
fn router(config: &Config, handler: Arc<llm::LlmHandler>) -> Router {
    let cors = cors::new_layer(&config.server.cors_origins);
    let auth = AuthLayer::new(&config.auth);

    if !config.auth.enforced() {
        log::warn!("API key auth is disabled; the relay accepts unauthenticated requests");
    }

    let api = llm::router(handler.clone()).layer(tower::ServiceBuilder::new().layer(cors.clone()).layer(auth));

    let open = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        .with_state(handler)
        .layer(cors);

    Router::new().merge(api).merge(open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_router(api_key: Option<&str>) -> Router {
        let mut config = Config::default();
        config.auth.api_key = api_key.map(|k| secrecy::SecretString::from(k.to_string()));
        config.auth.enabled = true;
        // An unroutable upstream: requests that pass auth fail fast with 502.
        config.upstream.base_url = "http://127.0.0.1:9".to_string();
        config.upstream.anonymous_token = true;

        let handler = llm::build_handler(&config);
        router(&config, handler)
    }

    async fn status_of(router: Router, request: Request<Body>) -> StatusCode {
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let router = test_router(Some("sk-local-test"));
        let request = Request::get("/health").body(Body::empty()).unwrap();

        assert_eq!(status_of(router, request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_needs_no_auth() {
        let router = test_router(Some("sk-local-test"));
        let request = Request::get("/metrics").body(Body::empty()).unwrap();

        assert_eq!(status_of(router, request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_completions_rejects_a_missing_key() {
        let router = test_router(Some("sk-local-test"));

        let request = Request::post("/v1/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"model":"GLM-4.5","messages":[]}"#))
            .unwrap();

        assert_eq!(status_of(router, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn chat_completions_rejects_a_wrong_key() {
        let router = test_router(Some("sk-local-test"));

        let request = Request::post("/v1/chat/completions")
            .header("content-type", "application/json")
            .header("authorization", "Bearer sk-wrong")
            .body(Body::from(r#"{"model":"GLM-4.5","messages":[]}"#))
            .unwrap();

        assert_eq!(status_of(router, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn messages_accepts_the_x_api_key_header() {
        let router = test_router(Some("sk-local-test"));

        // The upstream is unreachable in tests; anything but 401 shows the
        // key was accepted.
        let request = Request::post("/v1/messages")
            .header("content-type", "application/json")
            .header("x-api-key", "sk-local-test")
            .body(Body::from(
                r#"{"model":"claude-sonnet-4-20250514","max_tokens":16,"messages":[{"role":"user","content":"Hi"}]}"#,
            ))
            .unwrap();

        let status = status_of(router, request).await;
        assert_ne!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_disabled_when_no_key_is_configured() {
        let router = test_router(None);

        let request = Request::post("/v1/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"model":"GLM-4.5","messages":[]}"#))
            .unwrap();

        let status = status_of(router, request).await;
        assert_ne!(status, StatusCode::UNAUTHORIZED);
    }
}
