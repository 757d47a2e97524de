use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::messages::anthropic::AnthropicErrorDetails;

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Relay errors with their HTTP status codes.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Malformed or unsupported request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong API key.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The concurrent request cap was hit.
    #[error("Too many concurrent requests: {0}")]
    RateLimited(String),

    /// The upstream refused the request or the connection failed.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream went silent past the configured timeout.
    #[error("Upstream timed out after {0:?}")]
    UpstreamTimeout(std::time::Duration),

    /// Internal relay error.
    /// If Some(message), it came from the upstream and can be shown.
    /// If None, details must not leak to the caller.
    #[error("Internal server error")]
    Internal(Option<String>),
}

impl LlmError {
    /// The HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error type string for the response body.
    pub fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Unauthorized(_) => "authentication_error",
            Self::RateLimited(_) => "rate_limit_error",
            Self::UpstreamUnavailable(_) => "api_error",
            Self::UpstreamTimeout(_) => "timeout_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message that is safe to expose to API consumers.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(Some(upstream_msg)) => upstream_msg.clone(),
            Self::Internal(None) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Error response format compatible with the OpenAI API. Both dialects
/// reuse this shape for HTTP-level failures.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorDetails {
    pub(crate) message: String,
    pub(crate) r#type: String,
    pub(crate) code: u16,
    pub(crate) param: Option<String>,
}

impl ErrorResponse {
    /// In-stream error body for a failed tool call. Not an HTTP failure:
    /// the surrounding stream keeps going.
    pub(crate) fn tool_error(message: String, kind: &str) -> Self {
        ErrorResponse {
            error: ErrorDetails {
                message,
                r#type: format!("tool_call_error.{kind}"),
                code: 0,
                param: None,
            },
        }
    }
}

impl From<&LlmError> for ErrorResponse {
    fn from(error: &LlmError) -> Self {
        ErrorResponse {
            error: ErrorDetails {
                message: error.client_message(),
                r#type: error.error_type().to_string(),
                code: error.status_code().as_u16(),
                param: None,
            },
        }
    }
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from(&self);

        (status, Json(body)).into_response()
    }
}

impl From<&LlmError> for AnthropicErrorDetails {
    fn from(error: &LlmError) -> Self {
        AnthropicErrorDetails {
            error_type: error.error_type().to_string(),
            message: error.client_message(),
        }
    }
}

pub struct AnthropicErrorResponse {
    status: StatusCode,
    body: ErrorResponse,
}

impl From<LlmError> for AnthropicErrorResponse {
    fn from(error: LlmError) -> Self {
        let status = error.status_code();
        let body = ErrorResponse::from(&error);

        Self { status, body }
    }
}

impl IntoResponse for AnthropicErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type AnthropicResult<T> = std::result::Result<T, AnthropicErrorResponse>;
