use std::sync::Arc;

use candle_sync_core::{
    CandleStore, ScanReport, SeriesKey, SyncError, Timeframe, Window, align_window, sweep,
};

/// Read-only gap detection over a [`CandleStore`].
#[derive(Clone)]
pub struct GapScanner {
    store: Arc<dyn CandleStore>,
}

impl GapScanner {
    /// Scanner reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CandleStore>) -> Self {
        Self { store }
    }

    /// Missing candles of `(pair, timeframe_minutes)` in `[start, end]`.
    ///
    /// The window is snapped to the candle grid first; an aligned window
    /// without grid points is reported as complete without touching the store.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an empty pair, a non-positive timeframe or an
    /// inverted window (before any store access), and `Store` when the store
    /// query fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candle_sync::scanner::scan",
            skip(self),
        )
    )]
    pub async fn scan(
        &self,
        pair: &str,
        timeframe_minutes: i64,
        start: i64,
        end: i64,
    ) -> Result<ScanReport, SyncError> {
        let (series, timeframe) = validate(pair, timeframe_minutes, Window::new(start, end))?;
        self.scan_series(&series, timeframe, Window::new(start, end))
            .await
    }

    /// Scan an already validated series.
    ///
    /// # Errors
    /// Returns `Store` when the store query fails.
    pub async fn scan_series(
        &self,
        series: &SeriesKey,
        timeframe: Timeframe,
        window: Window,
    ) -> Result<ScanReport, SyncError> {
        let step = timeframe.step_seconds();
        let Some(aligned) = align_window(window, step) else {
            return Ok(sweep(window, step, std::iter::empty()));
        };
        let present = self
            .store
            .present_times(&series.pair, series.timeframe_minutes, aligned.start, aligned.end)
            .await?;
        Ok(sweep(window, step, present))
    }
}

/// Check the inputs shared by every public operation.
///
/// # Errors
/// Returns `InvalidArg` for an empty pair, a non-positive timeframe or an
/// inverted window.
pub fn validate(
    pair: &str,
    timeframe_minutes: i64,
    window: Window,
) -> Result<(SeriesKey, Timeframe), SyncError> {
    if pair.trim().is_empty() {
        return Err(SyncError::invalid_arg("pair must not be empty"));
    }
    let timeframe = Timeframe::try_from_minutes(timeframe_minutes)?;
    window.validate()?;
    Ok((SeriesKey::new(pair.trim(), timeframe), timeframe))
}
