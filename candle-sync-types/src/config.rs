//! Configuration types shared by the orchestrator, limiter and adapters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sustained request budget: up to `capacity` calls in a burst, one token
/// regained every `refill_every`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    /// Maximum tokens held at once; bounds bursts.
    pub capacity: u32,
    /// Interval at which one token is regained.
    pub refill_every: Duration,
}

impl RateBudget {
    /// `n` calls per second, no burst above one call.
    #[must_use]
    pub fn per_second(n: u32) -> Self {
        let n = n.max(1);
        Self {
            capacity: 1,
            refill_every: Duration::from_secs(1) / n,
        }
    }

    /// `n` calls per minute, no burst above one call.
    #[must_use]
    pub fn per_minute(n: u32) -> Self {
        let n = n.max(1);
        Self {
            capacity: 1,
            refill_every: Duration::from_secs(60) / n,
        }
    }

    /// Allow bursts of up to `capacity` calls.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::per_second(1)
    }
}

/// Budgets of the process-wide rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Budget for public calls (default: 1 call/second).
    pub public: RateBudget,
    /// Budget for the privileged call class; falls back to `public` when unset.
    pub private: Option<RateBudget>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public: RateBudget::per_second(1),
            private: None,
        }
    }
}

/// Exponential backoff between retries of one fetch cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Behavior when a concurrent run already holds a series lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LeasePolicy {
    /// Queue behind the current holder.
    #[default]
    Wait,
    /// Fail immediately with `LeaseHeld`.
    Reject,
}

/// Interpretation of a page carrying fewer rows than the upstream page limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ShortPagePolicy {
    /// Keep the rows and advance; the gap may close partially.
    #[default]
    Accept,
    /// Retry the same cursor as a transient failure, accepting the page once
    /// the attempts are used up.
    Retry,
}

/// Configuration of sync runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay schedule between retries.
    pub backoff: BackoffConfig,
    /// Attempts per cursor before a gap is abandoned (>= 1).
    pub max_attempts: u32,
    /// Backoff multiplier applied when the upstream signals throttling.
    pub throttle_factor: u32,
    /// Upper bound on gaps attempted per run; `None` attempts all.
    pub max_gaps_per_run: Option<usize>,
    /// What a run does when the series lease is held.
    pub lease_policy: LeasePolicy,
    /// Short page handling.
    pub short_page: ShortPagePolicy,
    /// Per-request upstream timeout; `None` leaves timeouts to the fetcher.
    pub fetch_timeout: Option<Duration>,
    /// Consecutive gaps ending in `NonProgressingCursor` that abort the run.
    pub non_progress_abort_after: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            max_attempts: 3,
            throttle_factor: 4,
            max_gaps_per_run: None,
            lease_policy: LeasePolicy::Wait,
            short_page: ShortPagePolicy::Accept,
            fetch_timeout: Some(Duration::from_secs(30)),
            non_progress_abort_after: 3,
        }
    }
}
