use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::endpoint::HealthTracker;
use crate::error::{Result, RpcError};
use crate::rate_limit::{BackoffConfig, RateLimiter, backoff_delay};
use crate::types::{JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub endpoints: Vec<Url>,
    /// Per-attempt ceiling on one outbound request.
    pub request_timeout: Duration,
    /// Ceiling on the cheap liveness probe.
    pub probe_timeout: Duration,
    /// How often the health-check pass re-probes the endpoints.
    pub health_check_interval: Duration,
    /// Retry ceiling for one logical request.
    pub max_retries: u32,
    /// Admissions per endpoint per window.
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub backoff: BackoffConfig,
}

impl PoolConfig {
    pub fn new(endpoints: Vec<Url>) -> Self {
        Self {
            endpoints,
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(60),
            max_retries: 3,
            rate_limit: 40,
            rate_window: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
        }
    }
}

struct PoolState {
    tracker: HealthTracker,
    last_health_check: Instant,
}

/// A pool of JSON-RPC endpoints behind one "get me a healthy, rate-limited
/// connection" operation plus the request retry envelope.
///
/// Explicitly constructed and injected; holds the only mutable view of
/// endpoint health.
pub struct EndpointPool {
    client: Client,
    state: Mutex<PoolState>,
    limiter: RateLimiter,
    config: PoolConfig,
    request_id: AtomicU64,
    closed: AtomicBool,
}

impl EndpointPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(RpcError::Other(
                "endpoint pool requires at least one endpoint".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("solgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .connect_timeout(config.probe_timeout)
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let tracker = HealthTracker::new(config.endpoints.clone());
        Ok(Self {
            client,
            state: Mutex::new(PoolState {
                tracker,
                // Endpoints are assumed live at startup; the first probe pass
                // runs once the interval elapses.
                last_health_check: Instant::now(),
            }),
            limiter: RateLimiter::new(),
            config,
            request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Pick a healthy endpoint that the rate limiter will admit.
    ///
    /// Runs the probe pass when the health-check interval has elapsed.
    /// Endpoints whose window is exhausted are skipped rather than waited on;
    /// when a full rotation finds no admissible endpoint the shortest
    /// retry-after is surfaced so the envelope can back off.
    pub async fn connection(&self) -> Result<Url> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Other("endpoint pool is closed".to_string()));
        }

        if self.health_check_due() {
            return self.run_health_check().await;
        }

        let count = self.config.endpoints.len();
        let mut shortest_wait: Option<Duration> = None;

        for _ in 0..count {
            let url = {
                let mut state = self.state.lock().unwrap();
                if state.tracker.all_failed() {
                    // Never lock ourselves out permanently: clear the failed
                    // set and start over from the top.
                    info!("all endpoints marked failed, resetting pool");
                    state.tracker.reset();
                }
                let index = match state.tracker.next_healthy() {
                    Some(index) => index,
                    None => continue,
                };
                state.tracker.url(index).clone()
            };

            match self.limiter.try_acquire(
                url.as_str(),
                self.config.rate_limit,
                self.config.rate_window,
            ) {
                Ok(()) => return Ok(url),
                Err(retry_after) => {
                    debug!("rate window exhausted for {url}, rotating");
                    shortest_wait = Some(match shortest_wait {
                        Some(wait) => wait.min(retry_after),
                        None => retry_after,
                    });
                }
            }
        }

        Err(RpcError::RateLimited {
            retry_after: shortest_wait.unwrap_or(self.config.rate_window),
        })
    }

    /// Send one JSON-RPC request through the pool with the full retry
    /// envelope: per-attempt timeout, retry on transient and rate-limit
    /// failures with capped backoff and jitter, endpoint rotation between
    /// attempts, hard failure at the ceiling.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.dispatch_once(method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(&self.config.backoff, attempt) + self.jitter();
                    if attempt == 0 {
                        debug!("{method} failed ({err}), retrying in {delay:?}");
                    } else {
                        warn!("{method} failed ({err}), retry {attempt} in {delay:?}");
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn dispatch_once(&self, method: &str, params: Value) -> Result<Value> {
        let url = self.connection().await?;
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let send = self.client.post(url.clone()).json(&request).send();
        let response = match tokio::time::timeout(self.config.request_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                self.note_failure(&url);
                return Err(err.into());
            }
            Err(_) => {
                self.note_failure(&url);
                return Err(RpcError::Timeout(self.config.request_timeout));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            let retry_after = retry_after_hint(&response).unwrap_or(self.config.rate_window);
            debug!("{url} rate limited ({status}), retry after {retry_after:?}");
            return Err(RpcError::RateLimited { retry_after });
        }
        if status == StatusCode::BAD_REQUEST {
            // A malformed request cannot be fixed by retrying. Treat the
            // response as empty data so the traversal keeps moving.
            debug!("{url} rejected request for {method} with 400");
            return Ok(Value::Null);
        }
        if !status.is_success() {
            self.note_failure(&url);
            return Err(RpcError::BadStatus(status.as_u16()));
        }

        let body: JsonRpcResponse = response.json().await.unwrap_or_default();
        if let Some(err) = body.error {
            return Err(RpcError::Upstream {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    /// Probe endpoints in round-robin order and hand back the first healthy
    /// one. When nothing answers, the failed set is cleared wholesale so the
    /// next pass starts fresh.
    async fn run_health_check(&self) -> Result<Url> {
        let count = {
            let mut state = self.state.lock().unwrap();
            state.last_health_check = Instant::now();
            state.tracker.len()
        };

        for _ in 0..count {
            let (index, url) = {
                let mut state = self.state.lock().unwrap();
                let index = state.tracker.advance();
                (index, state.tracker.url(index).clone())
            };

            if self.probe(&url).await {
                self.state.lock().unwrap().tracker.mark_healthy(index);
                return Ok(url);
            }

            warn!("endpoint {url} failed liveness probe");
            self.state.lock().unwrap().tracker.mark_failed(index);
        }

        info!("no endpoint passed the probe pass, resetting failed set");
        self.state.lock().unwrap().tracker.reset();
        Err(RpcError::AllEndpointsFailed(count))
    }

    /// Cheap liveness call with its own short timeout.
    async fn probe(&self, url: &Url) -> bool {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, "getHealth", Value::Array(Vec::new()));
        let send = self.client.post(url.clone()).json(&request).send();
        match tokio::time::timeout(self.config.probe_timeout, send).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }

    fn note_failure(&self, url: &Url) {
        let mut state = self.state.lock().unwrap();
        for index in 0..state.tracker.len() {
            if state.tracker.url(index) == url {
                state.tracker.mark_failed(index);
                return;
            }
        }
    }

    fn health_check_due(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.last_health_check.elapsed() >= self.config.health_check_interval
    }

    fn jitter(&self) -> Duration {
        let max = self.config.backoff.jitter;
        if max.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max.as_millis() as u64))
    }

    pub fn endpoint_count(&self) -> usize {
        self.config.endpoints.len()
    }

    pub fn failed_count(&self) -> usize {
        self.state.lock().unwrap().tracker.failed_count()
    }

    /// Shut the pool down. Subsequent requests fail fast.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("endpoint pool closed");
    }
}

fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
