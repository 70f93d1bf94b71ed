//! Data transfer objects, configuration primitives and the error taxonomy
//! shared by every candle-sync crate.
#![warn(missing_docs)]

mod candle;
mod config;
mod error;
mod reports;
mod window;

pub use candle::{Candle, CandleKey, SeriesKey, Timeframe};
pub use config::{
    BackoffConfig, LeasePolicy, RateBudget, RateLimitConfig, ShortPagePolicy, SyncConfig,
};
pub use error::SyncError;
pub use reports::{BackfillReport, ScanReport, SyncReport};
pub use window::{CoverageSummary, Gap, Window, grid_points, parse_time_input};
