//! Per-client fixed-window rate limiting.
//!
//! Each client key owns a counter and the start of its current window. A
//! request inside the window increments the counter and is admitted while the
//! counter stays within the limit; the first request after the window has
//! elapsed resets the counter to one and starts a new window at that instant.
//!
//! # Boundary burst
//!
//! A fixed window admits up to `limit` requests at the very end of one window
//! and another `limit` at the very start of the next, so up to twice the
//! limit can pass in a span shorter than one window. This is accepted in
//! exchange for constant memory per key and no timestamp log.
//!
//! # Concurrency
//!
//! Counters live in a sharded [`DashMap`]. The entry guard makes
//! check-then-increment atomic for one key, and keys on different shards never
//! contend. Expired counters are only removed by
//! [`purge_expired`](FixedWindowLimiter::purge_expired); correctness does not
//! depend on it.
//!
//! The limiter never sweeps on its own. A key that is never seen again keeps
//! its counter until a purge runs, so memory grows with the number of distinct
//! clients. Long-running services should purge on a timer:
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use gatekeeper_admission::rate_limiter::{FixedWindowLimiter, RateLimitConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = Arc::new(FixedWindowLimiter::new(RateLimitConfig::default()));
//!
//! let sweeper = Arc::clone(&limiter);
//! tokio::spawn(async move {
//!     let mut ticks = tokio::time::interval(Duration::from_secs(60));
//!     loop {
//!         ticks.tick().await;
//!         sweeper.purge_expired();
//!     }
//! });
//! # }
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gatekeeper_admission::rate_limiter::{FixedWindowLimiter, RateLimitConfig};
//!
//! let limiter = FixedWindowLimiter::new(RateLimitConfig::new(2, Duration::from_secs(5)));
//!
//! assert!(limiter.permit("10.0.0.1").0);
//! assert!(limiter.permit("10.0.0.1").0);
//! let (allowed, retry_after) = limiter.permit("10.0.0.1");
//! assert!(!allowed);
//! assert!(retry_after <= Duration::from_secs(5));
//!
//! // Other clients are unaffected.
//! assert!(limiter.permit("10.0.0.2").0);
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{
    clock::{Clock, SystemClock},
    error::{AdmissionError, AdmissionResult},
};

/// Default request budget per window.
pub const DEFAULT_REQUESTS_PER_WINDOW: u64 = 20;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Configuration for a fixed-window limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per key per window.
    limit: u64,
    /// Window length.
    window: Duration,
}

impl RateLimitConfig {
    /// Creates a new rate limit configuration.
    ///
    /// # Arguments
    ///
    /// * `limit` - Requests admitted per window (must be >= 1)
    /// * `window` - Window length (must be non-zero)
    ///
    /// # Panics
    ///
    /// Panics if `limit` or `window` is zero.
    #[must_use]
    pub fn new(limit: u64, window: Duration) -> Self {
        assert!(limit >= 1, "limit must be at least 1");
        assert!(!window.is_zero(), "window must be non-zero");
        Self { limit, window }
    }

    /// Returns the request budget per window.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: DEFAULT_REQUESTS_PER_WINDOW, window: DEFAULT_WINDOW }
    }
}

/// Counter state for one key.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    window_start: Instant,
}

impl WindowCounter {
    fn is_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}

/// Metrics tracked by the rate limiter.
#[derive(Debug, Default)]
struct RateLimitMetrics {
    allowed: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of rate limiter metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitMetricsSnapshot {
    /// Total requests that were allowed through.
    pub allowed: u64,
    /// Total requests that were rejected.
    pub rejected: u64,
}

/// A per-key fixed-window rate limiter.
///
/// Thread-safe; share it behind an [`Arc`].
pub struct FixedWindowLimiter {
    counters: DashMap<String, WindowCounter>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    metrics: RateLimitMetrics,
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("config", &self.config)
            .field("keys", &self.counters.len())
            .finish_non_exhaustive()
    }
}

impl FixedWindowLimiter {
    /// Creates a limiter reading the system clock.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Creates a limiter reading time from `clock`.
    #[must_use]
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { counters: DashMap::new(), config, clock, metrics: RateLimitMetrics::default() }
    }

    /// Returns the limiter configuration.
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Records a request for `key` and decides whether it may proceed.
    ///
    /// Returns `(true, Duration::ZERO)` when admitted, or `(false, retry_after)`
    /// where `retry_after` is the time left in the key's current window.
    pub fn permit(&self, key: &str) -> (bool, Duration) {
        let now = self.clock.now();
        let window = self.config.window;

        let decision = match self.counters.get_mut(key) {
            Some(mut counter) => Self::advance(&mut counter, now, self.config),
            None => {
                // Another request may have inserted the key since the lookup,
                // so resolve through the entry guard.
                let mut counter = self
                    .counters
                    .entry(key.to_owned())
                    .or_insert(WindowCounter { count: 0, window_start: now });
                Self::advance(&mut counter, now, self.config)
            },
        };

        match decision {
            None => {
                self.metrics.allowed.fetch_add(1, Ordering::Relaxed);
                (true, Duration::ZERO)
            },
            Some(window_start) => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                let retry_after = (window_start + window).saturating_duration_since(now);
                (false, retry_after)
            },
        }
    }

    /// Applies one request to `counter`. Returns `None` when admitted or the
    /// window start when rejected.
    fn advance(counter: &mut WindowCounter, now: Instant, config: RateLimitConfig) -> Option<Instant> {
        if counter.count == 0 || counter.is_elapsed(now, config.window) {
            *counter = WindowCounter { count: 1, window_start: now };
            return None;
        }

        counter.count = counter.count.saturating_add(1);
        if counter.count <= config.limit { None } else { Some(counter.window_start) }
    }

    /// Like [`permit`](Self::permit) but as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::RateLimited`] when the key is over its limit.
    pub fn check(&self, key: &str) -> AdmissionResult<()> {
        match self.permit(key) {
            (true, _) => Ok(()),
            (false, retry_after) => Err(AdmissionError::RateLimited { retry_after }),
        }
    }

    /// Removes counters whose window has elapsed. Returns how many were removed.
    ///
    /// A removed key behaves exactly like a key whose window elapsed, so this
    /// only reclaims memory.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let window = self.config.window;
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_elapsed(now, window));
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            tracing::trace!(removed, "purged expired rate limit counters");
        }
        removed
    }

    /// Number of keys currently holding a counter, including elapsed ones not
    /// yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns `true` if no key holds a counter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns a snapshot of the rate limiter metrics.
    #[must_use]
    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            allowed: self.metrics.allowed.load(Ordering::Relaxed),
            rejected: self.metrics.rejected.load(Ordering::Relaxed),
        }
    }
}
