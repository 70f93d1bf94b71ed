use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the candle-sync workspace.
///
/// Variants follow the failure taxonomy the backfill orchestrator acts on:
/// argument validation, transient and permanent upstream failures, upstream
/// throttling, cursor stalls, lease contention, and store failures.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncError {
    /// Invalid input argument (bad timeframe, inverted window, empty pair).
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Network, timeout or server-side failure; retried with backoff.
    #[error("transient fetch error: {0}")]
    TransientFetch(String),

    /// Authentication or validation failure reported by the upstream.
    #[error("permanent fetch error: {0}")]
    PermanentFetch(String),

    /// The upstream itself signalled throttling.
    #[error("rate limit exceeded: retry_after_ms={retry_after_ms:?}")]
    RateLimitExceeded {
        /// Suggested delay before the next call, when known.
        retry_after_ms: Option<u64>,
    },

    /// A page carried fewer rows than the upstream page limit.
    #[error("short page at cursor {cursor}: received {received} of {limit} rows")]
    ShortPage {
        /// Cursor the page was requested with.
        cursor: i64,
        /// Rows received.
        received: usize,
        /// Upstream page limit.
        limit: usize,
    },

    /// A response did not move the fetch cursor forward.
    #[error("non-progressing cursor: {cursor} -> {next}")]
    NonProgressingCursor {
        /// Cursor before the response.
        cursor: i64,
        /// Cursor derived from the response.
        next: i64,
    },

    /// Transient failures at one cursor exhausted the retry budget.
    #[error("retries exhausted at cursor {cursor} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Cursor at which the retries happened.
        cursor: i64,
        /// Number of attempts made.
        attempts: u32,
        /// The last transient error observed.
        last: Box<SyncError>,
    },

    /// Another run holds the lease for this series.
    #[error("sync lease held for {pair}/{timeframe_minutes}m")]
    LeaseHeld {
        /// Pair of the contended series.
        pair: String,
        /// Timeframe of the contended series.
        timeframe_minutes: u32,
    },

    /// The candle store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    /// Helper: build an `InvalidArg` error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    /// Helper: build a `TransientFetch` error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientFetch(msg.into())
    }

    /// Helper: build a `PermanentFetch` error.
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::PermanentFetch(msg.into())
    }

    /// Helper: build a `Store` error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Helper: build a `RateLimitExceeded` error.
    #[must_use]
    pub const fn throttled(retry_after_ms: Option<u64>) -> Self {
        Self::RateLimitExceeded { retry_after_ms }
    }

    /// Returns true if the same request may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientFetch(_) | Self::RateLimitExceeded { .. } | Self::ShortPage { .. }
        )
    }

    /// Returns true if the error should stop the whole run rather than a single gap.
    ///
    /// Permanent upstream failures and store failures are expected to affect
    /// every subsequent call.
    #[must_use]
    pub const fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermanentFetch(_) | Self::InvalidArg(_) | Self::Store(_)
        )
    }

    /// Returns true if the error is an upstream throttling signal.
    #[must_use]
    pub const fn is_throttle(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }
}
