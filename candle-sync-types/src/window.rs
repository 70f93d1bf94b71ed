use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::SyncError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Inclusive query window in UNIX seconds, arbitrary alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// First second of interest.
    pub start: i64,
    /// Last second of interest (inclusive).
    pub end: i64,
}

impl Window {
    /// Build a window without validation.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Reject inverted windows.
    ///
    /// # Errors
    /// Returns `InvalidArg` when `end < start`.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.end < self.start {
            return Err(SyncError::invalid_arg(format!(
                "window end {} precedes start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }

    /// Resolve optional bounds into a concrete window.
    ///
    /// - neither bound: the last `days` up to `now`
    /// - only `until`: `days` back from `until`
    /// - only `since`: from `since` up to `now`
    ///
    /// Derived starts are clamped at the epoch.
    ///
    /// # Errors
    /// Returns `InvalidArg` if the resolved window is inverted.
    pub fn resolve(
        since: Option<i64>,
        until: Option<i64>,
        days: u32,
        now: i64,
    ) -> Result<Self, SyncError> {
        let back = i64::from(days) * SECONDS_PER_DAY;
        let window = match (since, until) {
            (Some(start), Some(end)) => Self::new(start, end),
            (Some(start), None) => Self::new(start, now),
            (None, Some(end)) => Self::new(end.saturating_sub(back).max(0), end),
            (None, None) => Self::new(now.saturating_sub(back).max(0), now),
        };
        window.validate()?;
        Ok(window)
    }
}

/// Parse a user supplied time as epoch seconds, `YYYY-MM-DD` or
/// `YYYY-MM-DDTHH:MM:SS` (UTC).
///
/// Blank input yields `Ok(None)`.
///
/// # Errors
/// Returns `InvalidArg` when none of the formats match.
pub fn parse_time_input(value: &str) -> Result<Option<i64>, SyncError> {
    let candidate = value.trim();
    if candidate.is_empty() {
        return Ok(None);
    }
    if let Ok(epoch) = candidate.parse::<i64>() {
        return Ok(Some(epoch));
    }
    if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(Some(midnight.and_utc().timestamp()));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Some(dt.and_utc().timestamp()));
    }
    Err(SyncError::invalid_arg(format!(
        "invalid time '{value}', expected epoch seconds, YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS"
    )))
}

/// Number of grid points of `step` seconds in `[first, last]`, both on grid.
///
/// Computed in `i128`; saturates at `u64::MAX` and is zero when
/// `last < first`.
#[must_use]
pub fn grid_points(first: i64, last: i64, step: i64) -> u64 {
    let span = i128::from(last) - i128::from(first);
    if span < 0 {
        return 0;
    }
    u64::try_from(span / i128::from(step.max(1)) + 1).unwrap_or(u64::MAX)
}

/// Contiguous run of missing candle open times, `[start, end_exclusive)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gap {
    /// First missing open time.
    pub start: i64,
    /// One step past the last missing open time.
    pub end_exclusive: i64,
    /// Number of missing candles.
    pub missing_count: u64,
}

impl Gap {
    /// Build a gap over `[start, end_exclusive)` on a grid of `step` seconds.
    #[must_use]
    pub fn new(start: i64, end_exclusive: i64, step: i64) -> Self {
        let span = (i128::from(end_exclusive) - i128::from(start)).max(0);
        Self {
            start,
            end_exclusive,
            missing_count: u64::try_from(span / i128::from(step.max(1))).unwrap_or(u64::MAX),
        }
    }

    /// Build a gap from `start` through the inclusive `last` missing time.
    ///
    /// `end_exclusive` saturates at `i64::MAX` when `last` is the final grid
    /// point before the limit; `missing_count` stays exact.
    #[must_use]
    pub fn through(start: i64, last: i64, step: i64) -> Self {
        Self {
            start,
            end_exclusive: last.saturating_add(step),
            missing_count: grid_points(start, last, step),
        }
    }

    /// Last missing open time, i.e. the inclusive end of the span.
    #[must_use]
    pub const fn last(&self, step: i64) -> i64 {
        self.end_exclusive - step
    }

    /// Returns true if `time` falls inside the gap.
    #[must_use]
    pub const fn contains(&self, time: i64) -> bool {
        self.start <= time && time < self.end_exclusive
    }
}

/// Coverage of one series over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Candles expected on the aligned grid.
    pub expected: u64,
    /// Candles found.
    pub present: u64,
    /// Candles missing; always `expected - present`.
    pub missing: u64,
    /// `present / expected`, or `1.0` for an empty grid.
    pub ratio: f64,
}

impl CoverageSummary {
    /// Summary of an empty grid.
    pub const EMPTY: Self = Self {
        expected: 0,
        present: 0,
        missing: 0,
        ratio: 1.0,
    };

    /// Derive the summary from expected and present counts.
    #[must_use]
    pub fn from_counts(expected: u64, present: u64) -> Self {
        if expected == 0 {
            return Self::EMPTY;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = present as f64 / expected as f64;
        Self {
            expected,
            present,
            missing: expected.saturating_sub(present),
            ratio,
        }
    }

    /// Returns true when nothing is missing.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.missing == 0
    }
}

impl Default for CoverageSummary {
    fn default() -> Self {
        Self::EMPTY
    }
}
