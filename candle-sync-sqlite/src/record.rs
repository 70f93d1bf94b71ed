use candle_sync_core::Candle;
use sqlx::FromRow;

/// One `ohlc_bars` row as stored.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OhlcRecord {
    /// Trading pair.
    pub pair: String,
    /// Candle duration in minutes.
    pub timeframe_minutes: i64,
    /// Open time, UNIX seconds.
    pub time: i64,
    /// Open price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Nullable for rows written by older tooling.
    pub vwap: Option<f64>,
    /// Nullable for rows written by older tooling.
    pub volume: Option<f64>,
    /// Nullable for rows written by older tooling.
    pub count: Option<i64>,
}

impl OhlcRecord {
    /// Convert to a [`Candle`]; missing optional columns read as zero.
    ///
    /// Returns `None` for a row whose timeframe or trade count is out of range.
    #[must_use]
    pub fn into_candle(self) -> Option<Candle> {
        let timeframe_minutes = u32::try_from(self.timeframe_minutes).ok()?;
        let trade_count = u64::try_from(self.count.unwrap_or(0)).ok()?;
        Some(Candle {
            pair: self.pair,
            timeframe_minutes,
            time: self.time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            vwap: self.vwap.unwrap_or(0.0),
            volume: self.volume.unwrap_or(0.0),
            trade_count,
        })
    }
}
