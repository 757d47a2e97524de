use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::{finalize::FinalResponse, upstream::ChatRequest};

/// TTL + LRU cache over non-streaming completions, keyed by a CRC32
/// fingerprint of the canonical request projection.
pub(crate) struct ContentCache {
    cache: mini_moka::sync::Cache<u32, Arc<FinalResponse>>,
}

impl ContentCache {
    pub(crate) fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            cache: mini_moka::sync::Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub(crate) fn get(&self, fingerprint: u32) -> Option<Arc<FinalResponse>> {
        self.cache.get(&fingerprint)
    }

    pub(crate) fn insert(&self, fingerprint: u32, response: Arc<FinalResponse>) {
        self.cache.insert(fingerprint, response);
    }
}

/// Fingerprint of the fields that determine a completion: model, messages
/// and tool declarations. Sampling knobs are not part of the projection.
pub(crate) fn fingerprint(request: &ChatRequest) -> u32 {
    #[derive(Serialize)]
    struct Projection<'a> {
        model: &'a str,
        messages: &'a [crate::upstream::ChatTurn],
        tools: &'a Option<Vec<crate::messages::openai::Tool>>,
    }

    let projection = Projection {
        model: &request.model,
        messages: &request.messages,
        tools: &request.tools,
    };

    let canonical = serde_json::to_vec(&projection).unwrap_or_default();

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&canonical);
    hasher.finalize()
}
