//! The unauthenticated metrics endpoint.

use std::sync::Arc;

use axum::{Json, extract::State};
use llm::MetricsSnapshot;

pub(crate) async fn metrics(State(handler): State<Arc<llm::LlmHandler>>) -> Json<MetricsSnapshot> {
    Json(handler.metrics_snapshot())
}
