use std::time::Instant;
use url::Url;

/// A configured upstream endpoint and its mutable health state. Owned by the
/// pool; nothing outside the pool mutates it.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: Url,
    failed: bool,
    last_checked: Option<Instant>,
}

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            failed: false,
            last_checked: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn last_checked(&self) -> Option<Instant> {
        self.last_checked
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.last_checked = Some(Instant::now());
    }

    pub fn mark_healthy(&mut self) {
        self.failed = false;
        self.last_checked = Some(Instant::now());
    }
}

/// Round-robin cursor over the configured endpoints with a failed-set.
///
/// When every endpoint has been marked failed the tracker is reset wholesale
/// rather than partially, so a flapping upstream cannot lock the pool out
/// forever.
#[derive(Debug)]
pub struct HealthTracker {
    endpoints: Vec<Endpoint>,
    cursor: usize,
}

impl HealthTracker {
    pub fn new(urls: Vec<Url>) -> Self {
        Self {
            endpoints: urls.into_iter().map(Endpoint::new).collect(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn url(&self, index: usize) -> &Url {
        &self.endpoints[index].url
    }

    /// Next index in plain round-robin order, health ignored.
    pub fn advance(&mut self) -> usize {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        index
    }

    /// Next non-failed index in round-robin order. `None` when every
    /// endpoint is currently marked failed.
    pub fn next_healthy(&mut self) -> Option<usize> {
        for _ in 0..self.endpoints.len() {
            let index = self.advance();
            if !self.endpoints[index].is_failed() {
                return Some(index);
            }
        }
        None
    }

    pub fn mark_failed(&mut self, index: usize) {
        self.endpoints[index].mark_failed();
    }

    pub fn mark_healthy(&mut self, index: usize) {
        self.endpoints[index].mark_healthy();
    }

    pub fn all_failed(&self) -> bool {
        self.endpoints.iter().all(Endpoint::is_failed)
    }

    pub fn failed_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.is_failed()).count()
    }

    /// Clear every failure mark and rewind the cursor. Full reset.
    pub fn reset(&mut self) {
        for endpoint in &mut self.endpoints {
            endpoint.mark_healthy();
        }
        self.cursor = 0;
    }
}
