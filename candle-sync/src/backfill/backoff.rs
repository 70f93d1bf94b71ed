//! Retry delay schedule.

use std::time::Duration;

use candle_sync_core::BackoffConfig;
use rand::Rng;

/// `base_ms` plus a random share of at most `jitter_percent` of it.
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms.saturating_add(rng.random_range(0..jitter_range))
}

/// Upstream throttling hint attached to a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    /// Multiplier on the regular delay.
    pub factor: u32,
    /// Delay requested by the upstream, in milliseconds.
    pub retry_after_ms: Option<u64>,
}

/// Delay before retry number `attempt` (1-based) of the same cursor.
///
/// `min * factor^(attempt-1)` capped at `max`; throttled retries scale both
/// the delay and the cap by the throttle factor and never wait less than
/// the upstream asked for.
pub fn retry_delay(cfg: &BackoffConfig, attempt: u32, throttle: Option<Throttle>) -> Duration {
    let growth = u64::from(cfg.factor.max(1)).saturating_pow(attempt.saturating_sub(1));
    let mut base = cfg.min_backoff_ms.saturating_mul(growth);
    let mut cap = cfg.max_backoff_ms.max(cfg.min_backoff_ms);
    if let Some(t) = throttle {
        let factor = u64::from(t.factor.max(1));
        base = base.saturating_mul(factor);
        cap = cap.saturating_mul(factor);
    }
    let mut ms = jitter_wait(base.min(cap), u32::from(cfg.jitter_percent.min(100)));
    if let Some(requested) = throttle.and_then(|t| t.retry_after_ms) {
        ms = ms.max(requested);
    }
    Duration::from_millis(ms)
}
