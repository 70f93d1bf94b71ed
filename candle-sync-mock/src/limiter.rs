use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use candle_sync_core::{CallClass, RateLimiter, SyncError};

/// Limiter that never waits and counts permits per class.
///
/// Substitutes the process-wide limiter in tests so runs stay deterministic.
#[derive(Clone, Default)]
pub struct CountingLimiter {
    public: Arc<AtomicU64>,
    private: Arc<AtomicU64>,
}

impl CountingLimiter {
    /// Fresh limiter with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits granted for `class`.
    #[must_use]
    pub fn granted(&self, class: CallClass) -> u64 {
        self.counter(class).load(Ordering::SeqCst)
    }

    /// Permits granted across classes.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.granted(CallClass::Public) + self.granted(CallClass::Private)
    }

    fn counter(&self, class: CallClass) -> &AtomicU64 {
        match class {
            CallClass::Public => &self.public,
            CallClass::Private => &self.private,
        }
    }
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn acquire(&self, class: CallClass) {
        self.counter(class).fetch_add(1, Ordering::SeqCst);
    }

    fn try_acquire(&self, class: CallClass) -> Result<(), SyncError> {
        self.counter(class).fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
