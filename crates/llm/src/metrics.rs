//! Process-wide counters surfaced on the metrics endpoint.
//!
//! One instance is created at startup and injected into the components
//! that bump it; there is no global lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Counters for the relay process.
#[derive(Debug)]
pub struct RelayMetrics {
    started_at: Instant,
    requests_total: AtomicU64,
    active_requests: AtomicU64,
    model_list_cache_hits: AtomicU64,
    token_cache_hits: AtomicU64,
    content_cache_hits: AtomicU64,
    malformed_frames: AtomicU64,
    orphan_tool_terminators: AtomicU64,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: AtomicU64::new(0),
            active_requests: AtomicU64::new(0),
            model_list_cache_hits: AtomicU64::new(0),
            token_cache_hits: AtomicU64::new(0),
            content_cache_hits: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            orphan_tool_terminators: AtomicU64::new(0),
        }
    }
}

impl RelayMetrics {
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_finished(&self) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_model_list_cache_hit(&self) {
        self.model_list_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_cache_hit(&self) {
        self.token_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_content_cache_hit(&self) {
        self.content_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orphan_tool_terminator(&self) {
        self.orphan_tool_terminators.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of all counters, for the metrics endpoint.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            active_requests: self.active_requests.load(Ordering::Relaxed),
            cache_hits: CacheHits {
                model_list: self.model_list_cache_hits.load(Ordering::Relaxed),
                upstream_token: self.token_cache_hits.load(Ordering::Relaxed),
                content: self.content_cache_hits.load(Ordering::Relaxed),
            },
            malformed_upstream_frames: self.malformed_frames.load(Ordering::Relaxed),
            orphan_tool_terminators: self.orphan_tool_terminators.load(Ordering::Relaxed),
        }
    }
}

/// Serialized body of the metrics endpoint.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub requests_total: u64,
    pub active_requests: u64,
    pub cache_hits: CacheHits,
    pub malformed_upstream_frames: u64,
    pub orphan_tool_terminators: u64,
}

/// Cache hit counters, one per cache.
#[derive(Debug, Serialize)]
pub struct CacheHits {
    pub model_list: u64,
    pub upstream_token: u64,
    pub content: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = RelayMetrics::default();

        metrics.record_request();
        metrics.record_request();
        metrics.request_finished();
        metrics.record_content_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.active_requests, 1);
        assert_eq!(snapshot.cache_hits.content, 1);
    }
}
