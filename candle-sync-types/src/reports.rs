use serde::{Deserialize, Serialize};

use crate::{CoverageSummary, Gap, SyncError, Window};

/// Gap scanner output for one series and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Window as requested.
    pub window: Window,
    /// Window snapped to the candle grid; `None` when no grid point falls inside.
    pub aligned: Option<Window>,
    /// Missing spans, ascending and non-overlapping.
    pub gaps: Vec<Gap>,
    /// Coverage counts over the aligned window.
    pub coverage: CoverageSummary,
}

impl ScanReport {
    /// Returns true if the window has no missing candles.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Outcome of one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    /// Gaps the run attempted to fill.
    pub gaps_attempted: usize,
    /// Gaps confirmed closed, or closed early by end-of-history.
    pub gaps_closed: Vec<Gap>,
    /// Gaps still open after being attempted.
    pub gaps_remaining: Vec<Gap>,
    /// Gaps not attempted because of the per-run bound, an abort or cancellation.
    pub gaps_deferred: Vec<Gap>,
    /// Rows newly written to the store.
    pub candles_inserted: u64,
    /// Upstream requests issued, retries included.
    pub requests: u64,
    /// Errors recorded during the run.
    pub errors: Vec<SyncError>,
    /// The run stopped on a run-fatal error.
    pub aborted: bool,
    /// The run stopped because it was cancelled.
    pub cancelled: bool,
}

/// Report of a `sync` or `inspect` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Trading pair.
    pub pair: String,
    /// Candle duration in minutes.
    pub timeframe_minutes: u32,
    /// Window as requested.
    pub window: Window,
    /// Coverage after the run.
    pub coverage: CoverageSummary,
    /// Gaps still open after the run.
    pub gaps: Vec<Gap>,
    /// Rows newly written.
    pub inserted: u64,
    /// Human readable errors recorded by the run.
    pub errors: Vec<String>,
    /// No upstream call or write was made.
    #[serde(default)]
    pub dry_run: bool,
    /// Gaps closed by the run.
    #[serde(default)]
    pub gaps_closed: usize,
    /// Attempted gaps that stayed open.
    #[serde(default)]
    pub gaps_remaining: usize,
    /// Gaps left for a later run.
    #[serde(default)]
    pub gaps_deferred: usize,
    /// The run stopped on a run-fatal error.
    #[serde(default)]
    pub aborted: bool,
    /// The run was cancelled.
    #[serde(default)]
    pub cancelled: bool,
}

impl SyncReport {
    /// Report built from a scan alone.
    #[must_use]
    pub fn from_scan(pair: impl Into<String>, timeframe_minutes: u32, scan: ScanReport) -> Self {
        Self {
            pair: pair.into(),
            timeframe_minutes,
            window: scan.window,
            coverage: scan.coverage,
            gaps: scan.gaps,
            inserted: 0,
            errors: Vec::new(),
            dry_run: false,
            gaps_closed: 0,
            gaps_remaining: 0,
            gaps_deferred: 0,
            aborted: false,
            cancelled: false,
        }
    }

    /// Fold a backfill outcome into the report.
    #[must_use]
    pub fn with_backfill(mut self, run: &BackfillReport) -> Self {
        self.inserted = run.candles_inserted;
        self.errors = run.errors.iter().map(ToString::to_string).collect();
        self.gaps_closed = run.gaps_closed.len();
        self.gaps_remaining = run.gaps_remaining.len();
        self.gaps_deferred = run.gaps_deferred.len();
        self.aborted = run.aborted;
        self.cancelled = run.cancelled;
        self
    }
}
