use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

// tokio's Instant rather than std's so the clock obeys time-paused tests.
use tokio::time::Instant;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};

/// Remaining-window waits at or under this are slept out in `acquire`
/// instead of being surfaced to the caller.
const SHORT_WAIT: Duration = Duration::from_secs(2);

/// Minimum time between sweeps of expired windows.
const GC_INTERVAL: Duration = Duration::from_secs(30);

/// Log rate-limit retries only every this many attempts.
const RETRY_LOG_CADENCE: u32 = 3;

/// Admission window for one key.
#[derive(Debug)]
struct RateWindow {
    count: u32,
    window_reset_at: Instant,
}

/// Retry/backoff tuning shared by the pool envelope and the caller-facing
/// retry wrapper.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(250),
        }
    }
}

/// Deterministic portion of the retry schedule: capped exponential,
/// non-decreasing up to `max_delay`.
pub fn backoff_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config.base_delay.saturating_mul(factor).min(config.max_delay)
}

fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max.as_millis() as u64))
}

/// Per-key admission control over fixed windows.
///
/// Windows are created on first use and swept once they expire; this is the
/// only place that deletes its own keyed state.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    last_gc: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one request for `key`, sleeping out short window remainders.
    /// Longer waits surface as `RateLimited` carrying the retry-after hint.
    pub async fn acquire(&self, key: &str, limit: u32, window: Duration) -> Result<()> {
        loop {
            match self.try_acquire(key, limit, window) {
                Ok(()) => return Ok(()),
                Err(retry_after) if retry_after <= SHORT_WAIT => {
                    debug!("rate window for {key} full, waiting {retry_after:?}");
                    tokio::time::sleep(retry_after).await;
                }
                Err(retry_after) => {
                    return Err(RpcError::RateLimited { retry_after });
                }
            }
        }
    }

    /// Non-blocking admission check. On rejection returns how long until the
    /// window opens again.
    pub fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> std::result::Result<(), Duration> {
        self.maybe_gc();

        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            window_reset_at: now + window,
        });

        if now >= entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = now + window;
        }

        if entry.count < limit {
            entry.count += 1;
            Ok(())
        } else {
            Err(entry.window_reset_at.duration_since(now))
        }
    }

    /// Drop every expired window. Runs opportunistically from `try_acquire`
    /// on a `GC_INTERVAL` cadence, and directly from tests.
    pub fn gc_expired(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let before = windows.len();
        windows.retain(|_, entry| entry.window_reset_at > now);
        let swept = before - windows.len();
        if swept > 0 {
            debug!("rate limiter swept {swept} expired windows");
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap().len()
    }

    fn maybe_gc(&self) {
        let due = {
            let mut last = self.last_gc.lock().unwrap();
            let now = Instant::now();
            match *last {
                Some(at) if now.duration_since(at) < GC_INTERVAL => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };
        if due {
            self.gc_expired();
        }
    }
}

/// Retry `operation` across rate-limit signals with capped exponential
/// backoff plus a little jitter. Logs on a cadence rather than per attempt
/// to keep a saturated upstream from turning into a log storm.
pub async fn with_backoff<T, F, Fut>(config: &BackoffConfig, key: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limit() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt) + jitter(config.jitter);
                if attempt % RETRY_LOG_CADENCE == 0 {
                    warn!("rate limited on {key}, backing off {delay:?} (attempt {attempt})");
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
