use std::sync::Arc;
use std::time::Duration;

use candle_sync_core::{
    BackoffConfig, CancellationToken, CandleStore, LeasePolicy, RateLimitConfig, RateLimiter,
    SeriesKey, ShortPagePolicy, SyncConfig, SyncError, SyncReport, UpstreamFetcher, Window,
};
use candle_sync_middleware::{TimeoutFetcher, TokenBucketLimiter};

use crate::backfill::BackfillOrchestrator;
use crate::lease::LeaseRegistry;
use crate::scanner::{GapScanner, validate};

/// Entry point: scans series for gaps and backfills them.
pub struct CandleSync {
    pub(crate) scanner: GapScanner,
    pub(crate) orchestrator: BackfillOrchestrator,
    pub(crate) leases: LeaseRegistry,
    pub(crate) limiter: Arc<dyn RateLimiter>,
    pub(crate) cfg: SyncConfig,
}

/// Builder for [`CandleSync`].
pub struct CandleSyncBuilder {
    store: Option<Arc<dyn CandleStore>>,
    fetcher: Option<Arc<dyn UpstreamFetcher>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    rate_limits: RateLimitConfig,
    cfg: SyncConfig,
}

impl Default for CandleSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleSyncBuilder {
    /// Builder with default configuration and no collaborators.
    ///
    /// A store and a fetcher are required; the limiter defaults to a
    /// [`TokenBucketLimiter`] of one public call per second.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: None,
            fetcher: None,
            limiter: None,
            rate_limits: RateLimitConfig::default(),
            cfg: SyncConfig::default(),
        }
    }

    /// Candle persistence.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CandleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Upstream page source.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn UpstreamFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Share an existing limiter, e.g. one budget across several instances.
    ///
    /// Overrides [`rate_limits`](Self::rate_limits).
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Budgets of the default limiter.
    #[must_use]
    pub const fn rate_limits(mut self, cfg: RateLimitConfig) -> Self {
        self.rate_limits = cfg;
        self
    }

    /// Replace the whole run configuration.
    #[must_use]
    pub fn config(mut self, cfg: SyncConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Attempt at most `n` gaps per run; the rest are deferred.
    #[must_use]
    pub const fn max_gaps_per_run(mut self, n: usize) -> Self {
        self.cfg.max_gaps_per_run = Some(n);
        self
    }

    /// Attempts per cursor before a gap is abandoned.
    #[must_use]
    pub const fn max_attempts(mut self, n: u32) -> Self {
        self.cfg.max_attempts = n;
        self
    }

    /// Wait for or reject concurrent runs of the same series.
    #[must_use]
    pub const fn lease_policy(mut self, policy: LeasePolicy) -> Self {
        self.cfg.lease_policy = policy;
        self
    }

    /// Accept short pages or retry them.
    #[must_use]
    pub const fn short_page(mut self, policy: ShortPagePolicy) -> Self {
        self.cfg.short_page = policy;
        self
    }

    /// Retry delay schedule.
    #[must_use]
    pub const fn backoff(mut self, cfg: BackoffConfig) -> Self {
        self.cfg.backoff = cfg;
        self
    }

    /// Per-request upstream timeout; `None` leaves timeouts to the fetcher.
    #[must_use]
    pub const fn fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cfg.fetch_timeout = timeout;
        self
    }

    /// Build the facade.
    ///
    /// # Errors
    /// Returns `InvalidArg` if the store or the fetcher is missing, or if
    /// `max_attempts` is zero.
    pub fn build(self) -> Result<CandleSync, SyncError> {
        let store = self.store.ok_or_else(|| {
            SyncError::invalid_arg("no store configured; add one via store(...)")
        })?;
        let fetcher = self.fetcher.ok_or_else(|| {
            SyncError::invalid_arg("no fetcher configured; add one via fetcher(...)")
        })?;
        if self.cfg.max_attempts == 0 {
            return Err(SyncError::invalid_arg("max_attempts must be at least 1"));
        }
        let fetcher: Arc<dyn UpstreamFetcher> = match self.cfg.fetch_timeout {
            Some(timeout) => Arc::new(TimeoutFetcher::new(fetcher, timeout)),
            None => fetcher,
        };
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(TokenBucketLimiter::new(self.rate_limits)));

        Ok(CandleSync {
            scanner: GapScanner::new(Arc::clone(&store)),
            orchestrator: BackfillOrchestrator::new(
                store,
                fetcher,
                Arc::clone(&limiter),
                self.cfg.clone(),
            ),
            leases: LeaseRegistry::new(),
            limiter,
            cfg: self.cfg,
        })
    }
}

impl CandleSync {
    /// Start building a new instance.
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use candle_sync::{CandleSync, ShortPagePolicy};
    ///
    /// let sync = CandleSync::builder()
    ///     .store(Arc::new(SqliteCandleStore::connect("sqlite://candles.db").await?))
    ///     .fetcher(Arc::new(KrakenFetcher::new_default()?))
    ///     .short_page(ShortPagePolicy::Retry)
    ///     .max_gaps_per_run(50)
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn builder() -> CandleSyncBuilder {
        CandleSyncBuilder::new()
    }

    /// Store-backed gap scanner.
    #[must_use]
    pub const fn scanner(&self) -> &GapScanner {
        &self.scanner
    }

    /// Backfill orchestrator, for callers managing leases themselves.
    #[must_use]
    pub const fn orchestrator(&self) -> &BackfillOrchestrator {
        &self.orchestrator
    }

    /// Series leases held by running syncs.
    #[must_use]
    pub const fn leases(&self) -> &LeaseRegistry {
        &self.leases
    }

    /// The shared request budget.
    #[must_use]
    pub fn limiter(&self) -> Arc<dyn RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Coverage and gaps of a series without fetching anything.
    ///
    /// # Errors
    /// Returns `InvalidArg` for bad inputs and `Store` when the store fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "candle_sync::inspect", skip(self))
    )]
    pub async fn inspect(
        &self,
        pair: &str,
        timeframe_minutes: i64,
        window: Window,
    ) -> Result<SyncReport, SyncError> {
        let (series, timeframe) = validate(pair, timeframe_minutes, window)?;
        let scan = self.scanner.scan_series(&series, timeframe, window).await?;
        Ok(SyncReport::from_scan(series.pair, series.timeframe_minutes, scan))
    }

    /// Scan `window` and backfill its gaps; see [`sync_with_cancel`](Self::sync_with_cancel).
    ///
    /// # Errors
    /// Same as [`sync_with_cancel`](Self::sync_with_cancel).
    pub async fn sync(
        &self,
        pair: &str,
        timeframe_minutes: i64,
        window: Window,
        dry_run: bool,
    ) -> Result<SyncReport, SyncError> {
        self.sync_with_cancel(pair, timeframe_minutes, window, dry_run, &CancellationToken::new())
            .await
    }

    /// Scan `window` and backfill its gaps under the series lease.
    ///
    /// With `dry_run` the window is only scanned: no lease, fetch or write.
    /// Otherwise the returned report reflects a final scan after the run,
    /// along with everything the run recorded, including partial progress
    /// when it was aborted or cancelled.
    ///
    /// # Errors
    /// Returns `InvalidArg` for bad inputs (before any I/O), `LeaseHeld` when
    /// the lease is taken under [`LeasePolicy::Reject`], `Cancelled` when
    /// `cancel` fires while waiting for the lease, and `Store` when the
    /// initial scan fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "candle_sync::sync", skip(self, cancel))
    )]
    pub async fn sync_with_cancel(
        &self,
        pair: &str,
        timeframe_minutes: i64,
        window: Window,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let (series, timeframe) = validate(pair, timeframe_minutes, window)?;
        if dry_run {
            let scan = self.scanner.scan_series(&series, timeframe, window).await?;
            let mut report = SyncReport::from_scan(series.pair, series.timeframe_minutes, scan);
            report.dry_run = true;
            return Ok(report);
        }

        let _lease = self
            .leases
            .acquire(&series, self.cfg.lease_policy, cancel)
            .await?;
        let initial = self.scanner.scan_series(&series, timeframe, window).await?;
        let run = self
            .orchestrator
            .fill_gaps(&series, timeframe, initial.gaps.clone(), cancel)
            .await;

        let (scan, late_error) = match self.scanner.scan_series(&series, timeframe, window).await {
            Ok(scan) => (scan, None),
            Err(err) => (initial, Some(err)),
        };
        let mut report =
            SyncReport::from_scan(series.pair.clone(), series.timeframe_minutes, scan)
                .with_backfill(&run);
        if let Some(err) = late_error {
            report.errors.push(err.to_string());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            series = %series,
            inserted = report.inserted,
            gaps_left = report.gaps.len(),
            aborted = report.aborted,
            cancelled = report.cancelled,
            "sync finished"
        );
        Ok(report)
    }

    /// Sync several series concurrently over the shared limiter.
    ///
    /// Results are returned in input order; one series failing does not
    /// affect the others.
    pub async fn sync_all(
        &self,
        series: &[(String, i64)],
        window: Window,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Vec<Result<SyncReport, SyncError>> {
        let runs = series
            .iter()
            .map(|(pair, tf)| self.sync_with_cancel(pair, *tf, window, dry_run, cancel));
        futures::future::join_all(runs).await
    }

    /// Key of a validated series, for lease inspection.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an empty pair or a bad timeframe.
    pub fn series_key(pair: &str, timeframe_minutes: i64) -> Result<SeriesKey, SyncError> {
        validate(pair, timeframe_minutes, Window::new(0, 0)).map(|(series, _)| series)
    }
}
