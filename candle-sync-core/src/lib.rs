//! candle-sync-core
//!
//! Collaborator contracts and pure algorithms shared across candle-sync.
//!
//! - `store`: the [`CandleStore`] trait, the single source of truth for
//!   which candles are present.
//! - `fetcher`: the [`UpstreamFetcher`] trait and its [`FetchPage`] result.
//! - `limiter`: the [`RateLimiter`] contract every upstream call passes through.
//! - `timeseries`: grid alignment and the linear gap sweep.
//!
//! Async runtime (Tokio)
//! ---------------------
//! Cancellation is expressed with `tokio_util::sync::CancellationToken`, so
//! callers of [`RateLimiter::acquire_cancellable`] must run under Tokio 1.x.
#![warn(missing_docs)]

/// Upstream page retrieval.
pub mod fetcher;
/// Shared request budget contract.
pub mod limiter;
/// Candle persistence contract.
pub mod store;
/// Grid alignment and gap detection.
pub mod timeseries;

pub use candle_sync_types::*;
pub use fetcher::{FetchPage, UpstreamFetcher};
pub use limiter::{CallClass, RateLimiter};
pub use store::CandleStore;
pub use timeseries::gaps::{align_window, sweep};
pub use tokio_util::sync::CancellationToken;
