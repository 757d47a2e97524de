//! The shared-key auth gate in front of the dialect endpoints.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use config::AuthConfig;
use http::{Request, Response, StatusCode, request::Parts};
use secrecy::{ExposeSecret, SecretString};
use tower::Layer;

/// Header carrying the key on the Anthropic endpoint, next to the regular
/// `Authorization: Bearer` form.
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub(crate) struct AuthLayer(Arc<AuthLayerInner>);

struct AuthLayerInner {
    key: Option<SecretString>,
}

impl AuthLayer {
    pub(crate) fn new(config: &AuthConfig) -> Self {
        let key = config.enforced().then(|| config.api_key.clone()).flatten();

        Self(Arc::new(AuthLayerInner { key }))
    }
}

impl<Service> Layer<Service> for AuthLayer
where
    Service: Send + Clone,
{
    type Service = AuthService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AuthService {
            next,
            layer: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AuthService<Service> {
    next: Service,
    layer: Arc<AuthLayerInner>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AuthService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let layer = self.layer.clone();

        Box::pin(async move {
            let Some(key) = layer.key.as_ref() else {
                return next.call(req).await;
            };

            let (parts, body) = req.into_parts();

            let check = match presented_key(&parts) {
                Some(presented) if presented == key.expose_secret() => KeyCheck::Valid,
                Some(_) => KeyCheck::Invalid,
                None => KeyCheck::Missing,
            };

            match check {
                KeyCheck::Valid => next.call(Request::from_parts(parts, body)).await,
                KeyCheck::Invalid => Ok(error_response("invalid API key")),
                KeyCheck::Missing => Ok(error_response("missing API key")),
            }
        })
    }
}

enum KeyCheck {
    Valid,
    Invalid,
    Missing,
}

/// Extract the key the caller presented, if any.
///
/// `Authorization: Bearer <k>` works everywhere; the Anthropic messages
/// endpoint additionally accepts `x-api-key: <k>`.
fn presented_key(parts: &Parts) -> Option<&str> {
    if let Some(value) = parts.headers.get(http::header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        return Some(token);
    }

    if parts.uri.path().ends_with("/v1/messages")
        && let Some(value) = parts.headers.get(API_KEY_HEADER)
        && let Ok(value) = value.to_str()
    {
        return Some(value);
    }

    None
}

fn error_response(message: &str) -> Response<Body> {
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": "authentication_error",
            "code": 401,
            "param": null,
        }
    });

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response
        })
}
