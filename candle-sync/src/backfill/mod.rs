//! Rate-limited refill of detected gaps.

pub mod backoff;
pub mod state;

use std::sync::Arc;

use candle_sync_core::{
    BackfillReport, CancellationToken, CandleStore, Gap, RateLimiter, SeriesKey, SyncConfig,
    SyncError, Timeframe, UpstreamFetcher, Window,
};

use crate::scanner::GapScanner;
use backoff::{Throttle, retry_delay};
use state::{ErrorDecision, GapFill, PageDecision};

/// How one gap attempt ended.
#[derive(Debug)]
enum GapOutcome {
    /// The cursor walked past the end of the gap.
    Walked,
    /// The upstream returned no rows.
    EndOfHistory,
    /// The gap was given up; the run continues.
    Abandoned(SyncError),
    /// The run must stop.
    Aborted(SyncError),
    Cancelled,
}

/// Drives gaps through fetch, filter and upsert under the shared rate limiter.
///
/// The orchestrator is the only writer of a series; callers serialize runs
/// per series with a [`SyncLease`](crate::SyncLease).
pub struct BackfillOrchestrator {
    store: Arc<dyn CandleStore>,
    fetcher: Arc<dyn UpstreamFetcher>,
    limiter: Arc<dyn RateLimiter>,
    scanner: GapScanner,
    cfg: SyncConfig,
}

impl BackfillOrchestrator {
    /// Orchestrator over injected collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn CandleStore>,
        fetcher: Arc<dyn UpstreamFetcher>,
        limiter: Arc<dyn RateLimiter>,
        cfg: SyncConfig,
    ) -> Self {
        let scanner = GapScanner::new(Arc::clone(&store));
        Self {
            store,
            fetcher,
            limiter,
            scanner,
            cfg,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Scan `window` and fill every gap found.
    ///
    /// # Errors
    /// Returns `Store` if the initial scan fails; failures after that are
    /// recorded in the report.
    pub async fn run(
        &self,
        series: &SeriesKey,
        timeframe: Timeframe,
        window: Window,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, SyncError> {
        let scan = self.scanner.scan_series(series, timeframe, window).await?;
        Ok(self.fill_gaps(series, timeframe, scan.gaps, cancel).await)
    }

    /// Fill `gaps` oldest first.
    ///
    /// Each attempted gap is re-scanned afterwards and lands in exactly one of
    /// `gaps_closed` or `gaps_remaining`; gaps never attempted land in
    /// `gaps_deferred`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candle_sync::backfill::fill_gaps",
            skip(self, series, gaps, cancel),
            fields(series = %series, gaps = gaps.len(), fetcher = self.fetcher.name()),
        )
    )]
    pub async fn fill_gaps(
        &self,
        series: &SeriesKey,
        timeframe: Timeframe,
        mut gaps: Vec<Gap>,
        cancel: &CancellationToken,
    ) -> BackfillReport {
        gaps.sort_by_key(|g| g.start);
        let step = timeframe.step_seconds();
        let mut report = BackfillReport::default();
        let mut stalled_in_a_row: u32 = 0;
        let mut pending = gaps.into_iter();

        while let Some(gap) = pending.next() {
            let over_budget = self
                .cfg
                .max_gaps_per_run
                .is_some_and(|max| report.gaps_attempted >= max);
            if over_budget || cancel.is_cancelled() {
                report.cancelled |= cancel.is_cancelled();
                report.gaps_deferred.push(gap);
                report.gaps_deferred.extend(pending.by_ref());
                break;
            }

            report.gaps_attempted += 1;
            let mut fill = GapFill::new(gap, step, self.cfg.max_attempts);
            let outcome = self.fill_gap(series, &mut fill, cancel).await;
            report.candles_inserted += fill.inserted();
            report.requests += fill.requests();

            let stop = match outcome {
                GapOutcome::EndOfHistory => {
                    stalled_in_a_row = 0;
                    report.gaps_closed.push(gap);
                    false
                }
                GapOutcome::Walked => {
                    stalled_in_a_row = 0;
                    self.settle(series, timeframe, gap, &mut report).await;
                    false
                }
                GapOutcome::Abandoned(err) => {
                    if matches!(err, SyncError::NonProgressingCursor { .. }) {
                        stalled_in_a_row += 1;
                    } else {
                        stalled_in_a_row = 0;
                    }
                    report.errors.push(err);
                    self.settle(series, timeframe, gap, &mut report).await;
                    let limit = self.cfg.non_progress_abort_after;
                    if limit > 0 && stalled_in_a_row >= limit {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(series = %series, stalled_in_a_row, "upstream cursor keeps stalling; aborting run");
                        report.aborted = true;
                    }
                    report.aborted
                }
                GapOutcome::Aborted(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(series = %series, error = %err, "aborting run");
                    report.errors.push(err);
                    report.aborted = true;
                    self.settle(series, timeframe, gap, &mut report).await;
                    true
                }
                GapOutcome::Cancelled => {
                    report.cancelled = true;
                    self.settle(series, timeframe, gap, &mut report).await;
                    true
                }
            };
            if stop {
                report.gaps_deferred.extend(pending.by_ref());
                break;
            }
        }
        report
    }

    /// Re-scan exactly the span of an attempted gap and file it.
    async fn settle(
        &self,
        series: &SeriesKey,
        timeframe: Timeframe,
        gap: Gap,
        report: &mut BackfillReport,
    ) {
        let span = Window::new(gap.start, gap.last(timeframe.step_seconds()));
        match self.scanner.scan_series(series, timeframe, span).await {
            Ok(scan) if scan.is_complete() => report.gaps_closed.push(gap),
            Ok(_) => report.gaps_remaining.push(gap),
            Err(err) => {
                report.errors.push(err);
                report.gaps_remaining.push(gap);
            }
        }
    }

    async fn fill_gap(
        &self,
        series: &SeriesKey,
        fill: &mut GapFill,
        cancel: &CancellationToken,
    ) -> GapOutcome {
        let class = self.fetcher.call_class();
        let page_limit = self.fetcher.page_limit();

        while fill.is_open() {
            if cancel.is_cancelled() {
                return GapOutcome::Cancelled;
            }
            if self.limiter.acquire_cancellable(class, cancel).await.is_err() {
                return GapOutcome::Cancelled;
            }
            fill.record_request();

            let cursor = fill.cursor();
            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return GapOutcome::Cancelled,
                res = self.fetcher.fetch(&series.pair, series.timeframe_minutes, cursor) => res,
            };

            let failure = match fetched {
                Ok(page) => match fill.on_page(series, page, self.cfg.short_page, page_limit) {
                    PageDecision::EndOfHistory => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(series = %series, cursor, "upstream has no rows past cursor");
                        return GapOutcome::EndOfHistory;
                    }
                    PageDecision::Write { rows, next } => {
                        let written = if rows.is_empty() {
                            Ok(0)
                        } else {
                            self.store.upsert(&rows).await
                        };
                        match written {
                            Ok(n) => {
                                fill.advance(next, n);
                                continue;
                            }
                            Err(e) => e,
                        }
                    }
                    PageDecision::Failed(e) => e,
                },
                Err(e) => e,
            };

            match fill.on_error(failure) {
                ErrorDecision::Retry {
                    attempt,
                    throttled,
                    retry_after_ms,
                } => {
                    let throttle = throttled.then_some(Throttle {
                        factor: self.cfg.throttle_factor,
                        retry_after_ms,
                    });
                    let delay = retry_delay(&self.cfg.backoff, attempt, throttle);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        series = %series,
                        cursor,
                        attempt,
                        throttled,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying upstream fetch"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return GapOutcome::Cancelled,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                ErrorDecision::Abandon(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(series = %series, cursor, error = %err, "abandoning gap");
                    return GapOutcome::Abandoned(err);
                }
                ErrorDecision::Abort(err) => return GapOutcome::Aborted(err),
                ErrorDecision::Cancel => return GapOutcome::Cancelled,
            }
        }
        GapOutcome::Walked
    }
}
