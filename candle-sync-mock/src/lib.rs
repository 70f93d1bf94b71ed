//! Deterministic collaborators for candle-sync tests and demos.
//!
//! - [`InMemoryStore`]: `CandleStore` over ordered maps, with failure injection.
//! - [`ScriptedFetcher`]: `UpstreamFetcher` driven per cursor by a
//!   [`FetcherController`], optionally backed by a [`SyntheticHistory`].
//! - [`CountingLimiter`]: `RateLimiter` that never waits and counts permits.

mod fetcher;
mod limiter;
mod store;

pub use fetcher::{
    FetchCall, FetcherController, MockBehavior, ScriptedFetcher, ScriptedFetcherBuilder,
    SyntheticHistory,
};
pub use limiter::CountingLimiter;
pub use store::InMemoryStore;

use candle_sync_core::{Candle, FetchPage};

/// Candle fixture with prices derived from `time` so rows are distinguishable.
#[must_use]
pub fn candle(pair: &str, timeframe_minutes: u32, time: i64) -> Candle {
    #[allow(clippy::cast_precision_loss)]
    let base = 100.0 + (time.rem_euclid(10_000) as f64) / 100.0;
    Candle {
        pair: pair.to_string(),
        timeframe_minutes,
        time,
        open: base,
        high: base + 1.0,
        low: base - 1.0,
        close: base + 0.5,
        vwap: base + 0.25,
        volume: 10.0,
        trade_count: 3,
    }
}

/// Page of fixture candles at `times`, continuation at the last one.
#[must_use]
pub fn page(pair: &str, timeframe_minutes: u32, times: &[i64]) -> FetchPage {
    let rows: Vec<Candle> = times
        .iter()
        .map(|&t| candle(pair, timeframe_minutes, t))
        .collect();
    FetchPage::new(rows, times.last().copied())
}
