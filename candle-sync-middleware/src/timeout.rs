use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use candle_sync_core::{CallClass, FetchPage, SyncError, UpstreamFetcher};

/// Wrapper that bounds every fetch with a timeout.
///
/// An elapsed timeout is reported as a transient failure so the orchestrator
/// retries the same cursor.
pub struct TimeoutFetcher {
    inner: Arc<dyn UpstreamFetcher>,
    timeout: Duration,
}

impl TimeoutFetcher {
    /// Wrap `inner` with a per-call `timeout`.
    #[must_use]
    pub fn new(inner: Arc<dyn UpstreamFetcher>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Access the inner fetcher.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn UpstreamFetcher> {
        &self.inner
    }
}

#[async_trait]
impl UpstreamFetcher for TimeoutFetcher {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candle_sync::middleware::fetch_with_timeout",
            skip(self),
            fields(
                fetcher = self.inner.name(),
                timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        )
    )]
    async fn fetch(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        since: i64,
    ) -> Result<FetchPage, SyncError> {
        tokio::time::timeout(
            self.timeout,
            self.inner.fetch(pair, timeframe_minutes, since),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SyncError::transient(format!(
                "{} timed out after {}ms",
                self.inner.name(),
                self.timeout.as_millis()
            )))
        })
    }

    fn page_limit(&self) -> Option<usize> {
        self.inner.page_limit()
    }

    fn call_class(&self) -> CallClass {
        self.inner.call_class()
    }
}
