use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candle_sync_core::{Candle, CandleStore, SeriesKey, SyncError};

#[derive(Default)]
struct StoreState {
    series: HashMap<SeriesKey, BTreeMap<i64, Candle>>,
    fail_next_upserts: usize,
    upsert_calls: usize,
    range_queries: usize,
}

/// Thread-safe in-memory [`CandleStore`].
///
/// Clones share the same data, so a test can keep a handle while the store is
/// owned by the orchestrator.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("mutex poisoned")
    }

    /// Insert rows directly, bypassing alignment checks; used to seed fixtures,
    /// including malformed ones.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn seed(&self, rows: impl IntoIterator<Item = Candle>) {
        let mut st = self.lock();
        for c in rows {
            let key = SeriesKey {
                pair: c.pair.clone(),
                timeframe_minutes: c.timeframe_minutes,
            };
            st.series.entry(key).or_default().insert(c.time, c);
        }
    }

    /// Open times stored for one series, ascending.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn times(&self, series: &SeriesKey) -> Vec<i64> {
        self.lock()
            .series
            .get(series)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Stored candle at `time`, if any.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, series: &SeriesKey, time: i64) -> Option<Candle> {
        self.lock()
            .series
            .get(series)
            .and_then(|rows| rows.get(&time).cloned())
    }

    /// Make the next `n` upserts fail with a store error, writing nothing.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_upserts(&self, n: usize) {
        self.lock().fail_next_upserts = n;
    }

    /// Number of upsert calls seen, failed ones included.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.lock().upsert_calls
    }

    /// Number of range queries served.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn range_queries(&self) -> usize {
        self.lock().range_queries
    }
}

#[async_trait]
impl CandleStore for InMemoryStore {
    async fn range_query(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, SyncError> {
        let mut st = self.lock();
        st.range_queries += 1;
        if end < start {
            return Ok(Vec::new());
        }
        let key = SeriesKey {
            pair: pair.to_string(),
            timeframe_minutes,
        };
        Ok(st
            .series
            .get(&key)
            .map(|rows| rows.range(start..=end).map(|(_, c)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, rows: &[Candle]) -> Result<u64, SyncError> {
        let mut st = self.lock();
        st.upsert_calls += 1;
        if st.fail_next_upserts > 0 {
            st.fail_next_upserts -= 1;
            return Err(SyncError::store("injected upsert failure"));
        }
        let mut inserted = 0;
        for c in rows {
            let key = SeriesKey {
                pair: c.pair.clone(),
                timeframe_minutes: c.timeframe_minutes,
            };
            let series = st.series.entry(key).or_default();
            if !series.contains_key(&c.time) {
                series.insert(c.time, c.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
