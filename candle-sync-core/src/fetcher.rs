use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Candle, CallClass, SyncError};

/// One page of upstream candles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchPage {
    /// Candles in ascending time order, already normalized.
    pub rows: Vec<Candle>,
    /// Upstream continuation marker (the next `since`), when provided.
    pub continuation: Option<i64>,
}

impl FetchPage {
    /// Build a page.
    #[must_use]
    pub const fn new(rows: Vec<Candle>, continuation: Option<i64>) -> Self {
        Self { rows, continuation }
    }

    /// A page with no rows and no marker, i.e. end of history.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rows: Vec::new(),
            continuation: None,
        }
    }

    /// Latest open time among the rows.
    #[must_use]
    pub fn last_time(&self) -> Option<i64> {
        self.rows.iter().map(|c| c.time).max()
    }
}

/// Retrieves one page of candles per call.
///
/// Fetching is assumed idempotent for a fixed `since`: repeated calls return
/// the same page or a superset, never a divergent one. Implementations
/// normalize the upstream shape into [`Candle`] before returning and classify
/// failures into the [`SyncError`] taxonomy.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Candles of `(pair, timeframe_minutes)` with open time at or after `since`.
    async fn fetch(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        since: i64,
    ) -> Result<FetchPage, SyncError>;

    /// Maximum rows per page, when the upstream caps pages.
    fn page_limit(&self) -> Option<usize> {
        None
    }

    /// Budget class the fetch calls are charged to.
    fn call_class(&self) -> CallClass {
        CallClass::Public
    }
}
