//! Token bucket implementation of the [`RateLimiter`] contract.
//!
//! Each budget is a bucket behind a `tokio::sync::Mutex`. Waiters queue on the
//! mutex in arrival order, and the holder sleeps until the next token while
//! still holding the lock. A token is only taken once the wait is over, so a
//! waiter that is dropped mid-sleep leaves the queue without spending budget.

use std::time::Duration;

use async_trait::async_trait;
use candle_sync_core::{CallClass, RateBudget, RateLimitConfig, RateLimiter, SyncError};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Process-wide token bucket limiter with an optional private tier.
pub struct TokenBucketLimiter {
    config: RateLimitConfig,
    public: Mutex<Bucket>,
    private: Option<Mutex<Bucket>>,
}

struct Bucket {
    capacity: u32,
    tokens: u32,
    refill_every: Duration,
    last_refill: Instant,
}

impl Bucket {
    fn new(budget: RateBudget, now: Instant) -> Self {
        let capacity = budget.capacity.max(1);
        Self {
            capacity,
            tokens: capacity,
            refill_every: budget.refill_every.max(Duration::from_nanos(1)),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        if self.tokens >= self.capacity {
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_refill);
        let gained = elapsed.as_nanos() / self.refill_every.as_nanos();
        if gained == 0 {
            return;
        }
        let gained = u32::try_from(gained).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(gained).min(self.capacity);
        if self.tokens >= self.capacity {
            self.last_refill = now;
        } else {
            // gained < capacity here, so the product stays below `elapsed`
            self.last_refill += self.refill_every * gained;
        }
    }

    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            return Ok(());
        }
        Err((self.last_refill + self.refill_every).saturating_duration_since(now))
    }
}

impl TokenBucketLimiter {
    /// Create a limiter; every bucket starts full.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            public: Mutex::new(Bucket::new(config.public, now)),
            private: config.private.map(|b| Mutex::new(Bucket::new(b, now))),
        }
    }

    /// Configured budgets.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn bucket(&self, class: CallClass) -> &Mutex<Bucket> {
        match (class, &self.private) {
            (CallClass::Private, Some(private)) => private,
            _ => &self.public,
        }
    }

    fn budget(&self, class: CallClass) -> RateBudget {
        match (class, self.config.private) {
            (CallClass::Private, Some(private)) => private,
            _ => self.config.public,
        }
    }
}

impl Default for TokenBucketLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn acquire(&self, class: CallClass) {
        let mut bucket = self.bucket(class).lock().await;
        loop {
            match bucket.try_take(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        ?class,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "waiting for rate limit token"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn try_acquire(&self, class: CallClass) -> Result<(), SyncError> {
        let throttled = |wait: Duration| {
            SyncError::throttled(Some(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)))
        };
        // A held lock means callers are already queued ahead of us.
        let Ok(mut bucket) = self.bucket(class).try_lock() else {
            return Err(throttled(self.budget(class).refill_every));
        };
        bucket.try_take(Instant::now()).map_err(throttled)
    }
}
