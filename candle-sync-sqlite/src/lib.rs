//! candle-sync-sqlite
//!
//! [`CandleStore`] over a SQLite `ohlc_bars` table.
//!
//! Rows are keyed by `(pair, timeframe_minutes, time)`. Inserts use
//! `ON CONFLICT DO NOTHING`, so stored candles are never rewritten, and each
//! [`upsert`](CandleStore::upsert) call runs in one transaction.
//!
//! ```rust,ignore
//! use candle_sync_sqlite::SqliteCandleStore;
//!
//! let store = SqliteCandleStore::connect("sqlite://data/ohlc.db").await?;
//! ```
#![warn(missing_docs)]

mod record;

use std::str::FromStr;

use async_trait::async_trait;
use candle_sync_core::{Candle, CandleStore, SyncError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use record::OhlcRecord;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS ohlc_bars (
    pair TEXT NOT NULL,
    timeframe_minutes INTEGER NOT NULL,
    time INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    vwap REAL,
    volume REAL,
    count INTEGER,
    PRIMARY KEY (pair, timeframe_minutes, time)
)";

const CREATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_ohlc_pair_tf_time
    ON ohlc_bars (pair, timeframe_minutes, time)";

const INSERT_BAR: &str = r"
INSERT INTO ohlc_bars (pair, timeframe_minutes, time, open, high, low, close, vwap, volume, count)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (pair, timeframe_minutes, time) DO NOTHING";

fn store_err(e: sqlx::Error) -> SyncError {
    SyncError::store(format!("sqlite: {e}"))
}

/// SQLite-backed candle store.
#[derive(Debug, Clone)]
pub struct SqliteCandleStore {
    pool: SqlitePool,
}

impl SqliteCandleStore {
    /// Open (creating if missing) the database at `url` and apply the schema.
    ///
    /// # Errors
    /// Returns `Store` when the URL is invalid or the database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(store_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(store_err)?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database on a single connection.
    ///
    /// Each SQLite connection sees its own `:memory:` database, so the pool is
    /// pinned to one connection that is never recycled.
    ///
    /// # Errors
    /// Returns `Store` when the database cannot be opened.
    pub async fn in_memory() -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(store_err)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply the schema.
    ///
    /// # Errors
    /// Returns `Store` when the schema cannot be created.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SyncError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the table and index if they do not exist.
    ///
    /// # Errors
    /// Returns `Store` on any SQL failure.
    pub async fn migrate(&self) -> Result<(), SyncError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Number of stored rows of one series.
    ///
    /// # Errors
    /// Returns `Store` on any SQL failure.
    pub async fn count(&self, pair: &str, timeframe_minutes: u32) -> Result<u64, SyncError> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ohlc_bars WHERE pair = ? AND timeframe_minutes = ?",
        )
        .bind(pair)
        .bind(i64::from(timeframe_minutes))
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

#[async_trait]
impl CandleStore for SqliteCandleStore {
    async fn range_query(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, SyncError> {
        let records: Vec<OhlcRecord> = sqlx::query_as(
            r"
            SELECT pair, timeframe_minutes, time, open, high, low, close, vwap, volume, count
            FROM ohlc_bars
            WHERE pair = ? AND timeframe_minutes = ? AND time >= ? AND time <= ?
            ORDER BY time ASC
            ",
        )
        .bind(pair)
        .bind(i64::from(timeframe_minutes))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(records.into_iter().filter_map(OhlcRecord::into_candle).collect())
    }

    async fn present_times(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<i64>, SyncError> {
        sqlx::query_scalar(
            r"
            SELECT time FROM ohlc_bars
            WHERE pair = ? AND timeframe_minutes = ? AND time >= ? AND time <= ?
            ORDER BY time ASC
            ",
        )
        .bind(pair)
        .bind(i64::from(timeframe_minutes))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "candle_sync::sqlite::upsert", skip(self, rows), fields(rows = rows.len()))
    )]
    async fn upsert(&self, rows: &[Candle]) -> Result<u64, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut inserted: u64 = 0;
        for c in rows {
            let done = sqlx::query(INSERT_BAR)
                .bind(&c.pair)
                .bind(i64::from(c.timeframe_minutes))
                .bind(c.time)
                .bind(c.open)
                .bind(c.high)
                .bind(c.low)
                .bind(c.close)
                .bind(c.vwap)
                .bind(c.volume)
                .bind(i64::try_from(c.trade_count).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            inserted += done.rows_affected();
        }
        tx.commit().await.map_err(store_err)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(inserted, "ohlc_bars upsert committed");
        Ok(inserted)
    }
}
