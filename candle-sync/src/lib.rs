//! candle-sync keeps a local OHLC candle store gapless.
//!
//! Overview
//! - [`GapScanner`] snaps a window to the candle grid and sweeps the stored
//!   open times into contiguous missing spans with a coverage summary.
//! - [`BackfillOrchestrator`] refills those spans oldest-first through an
//!   injected [`UpstreamFetcher`], spending one [`RateLimiter`] permit per
//!   request and writing through idempotent [`CandleStore`] upserts.
//! - [`CandleSync`] ties both together behind a per-series [`SyncLease`].
//!
//! Key behaviors and trade-offs
//! - Cursors only move forward. A page that would not advance the cursor
//!   abandons its gap; repeated stalls abort the run.
//! - Transient failures retry the same cursor with exponential backoff and
//!   jitter, a bounded number of times. Permanent and store failures abort
//!   the run; the report still carries the partial progress.
//! - Short pages are accepted by default (`ShortPagePolicy::Accept`), or
//!   retried before being accepted (`ShortPagePolicy::Retry`).
//! - Every attempted gap is re-scanned, so reports never claim a closure the
//!   store cannot confirm.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use candle_sync::{CandleSync, Window};
//!
//! let sync = CandleSync::builder()
//!     .store(store)
//!     .fetcher(fetcher)
//!     .build()?;
//! let report = sync
//!     .sync("ETHUSD", 15, Window::new(1_731_762_900, 1_731_772_800), false)
//!     .await?;
//! println!("inserted {} candles, {} gaps left", report.inserted, report.gaps.len());
//! ```
#![warn(missing_docs)]

/// Gap refill protocol and its state machine.
pub mod backfill;
mod core;
mod lease;
mod scanner;

pub use backfill::BackfillOrchestrator;
pub use backfill::state::{ErrorDecision, GapFill, PageDecision};
pub use crate::core::{CandleSync, CandleSyncBuilder};
pub use lease::{LeaseRegistry, SyncLease};
pub use scanner::{GapScanner, validate};

pub use candle_sync_core::{
    BackfillReport, BackoffConfig, CallClass, Candle, CandleKey, CandleStore, CancellationToken,
    CoverageSummary, FetchPage, Gap, LeasePolicy, RateBudget, RateLimitConfig, RateLimiter,
    ScanReport, SeriesKey, ShortPagePolicy, SyncConfig, SyncError, SyncReport, Timeframe,
    UpstreamFetcher, Window, parse_time_input,
};
pub use candle_sync_middleware::{TimeoutFetcher, TokenBucketLimiter};
