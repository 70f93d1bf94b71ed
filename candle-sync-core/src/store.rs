use async_trait::async_trait;

use crate::{Candle, SyncError};

/// Durable, keyed, range-queryable candle persistence.
///
/// Implementations must key rows by `(pair, timeframe_minutes, time)` and keep
/// an ordering index on the same triple.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Rows of one series with `start <= time <= end`, ascending and unique by key.
    async fn range_query(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, SyncError>;

    /// Open times present for one series in `[start, end]`, ascending.
    ///
    /// The default derives them from [`range_query`](Self::range_query); stores
    /// that can answer from an index alone should override it.
    async fn present_times(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<i64>, SyncError> {
        let rows = self.range_query(pair, timeframe_minutes, start, end).await?;
        Ok(rows.into_iter().map(|c| c.time).collect())
    }

    /// Insert rows that are not yet present; existing keys are left untouched.
    ///
    /// The call is all-or-nothing and returns the number of rows newly written.
    async fn upsert(&self, rows: &[Candle]) -> Result<u64, SyncError>;
}
