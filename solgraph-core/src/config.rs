use std::time::Duration;

use solgraph_rpc::PoolConfig;
use url::Url;

/// Tunables for one explorer session. Constructed by the caller and injected
/// into the builder; there is no global configuration.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub pool: PoolConfig,
    /// Hop-count ceiling from the traversal seed.
    pub max_depth: u32,
    /// Hard cap on queued fetches; discoveries beyond it are dropped.
    pub queue_capacity: usize,
    /// Items fetched concurrently per batch.
    pub batch_size: usize,
    /// Independent per-item ceiling inside a batch.
    pub item_timeout: Duration,
    /// Pacing between batches so upstream endpoints are not saturated.
    pub batch_delay: Duration,
    /// Token-transfer resolution keeps the top N rows by amount.
    pub top_transfers: usize,
    /// Signature rows fetched by the fallback history tier.
    pub history_limit: usize,
    /// Grace period after queueing a focused transaction's participants.
    pub propagation_delay: Duration,
    /// Session-specific additions to the static exclusion list.
    pub extra_exclusions: Vec<String>,
}

impl ExplorerConfig {
    pub fn new(endpoints: Vec<Url>) -> Self {
        Self {
            pool: PoolConfig::new(endpoints),
            max_depth: 3,
            queue_capacity: 500,
            batch_size: 10,
            item_timeout: Duration::from_secs(30),
            batch_delay: Duration::from_millis(50),
            top_transfers: 10,
            history_limit: 20,
            propagation_delay: Duration::from_millis(200),
            extra_exclusions: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}
