//! Per-gap fill state machine.
//!
//! [`GapFill`] owns the cursor of one gap and turns every fetch outcome into a
//! decision for the orchestrator. Transitions are pure; the orchestrator
//! performs the I/O they ask for.

use candle_sync_core::{Candle, FetchPage, Gap, SeriesKey, ShortPagePolicy, SyncError};

/// What to do with a fetched page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageDecision {
    /// Persist `rows` (possibly empty), then move the cursor to `next`.
    Write {
        /// Rows inside the gap, aligned and of the right series.
        rows: Vec<Candle>,
        /// Cursor for the next fetch, strictly greater than the current one.
        next: i64,
    },
    /// The upstream has nothing at or after the cursor.
    EndOfHistory,
    /// The page counts as a failure; feed it to [`GapFill::on_error`].
    Failed(SyncError),
}

/// What to do after a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDecision {
    /// Retry the same cursor after a backoff.
    Retry {
        /// Attempts made so far at this cursor.
        attempt: u32,
        /// The upstream signalled throttling.
        throttled: bool,
        /// Delay requested by the upstream.
        retry_after_ms: Option<u64>,
    },
    /// Give up on this gap and move to the next one.
    Abandon(SyncError),
    /// Stop the whole run.
    Abort(SyncError),
    /// The run was cancelled.
    Cancel,
}

/// Progress through one gap.
#[derive(Debug, Clone)]
pub struct GapFill {
    gap: Gap,
    step: i64,
    cursor: i64,
    attempt: u32,
    max_attempts: u32,
    inserted: u64,
    requests: u64,
}

impl GapFill {
    /// Start at the first missing time of `gap`.
    #[must_use]
    pub fn new(gap: Gap, step: i64, max_attempts: u32) -> Self {
        Self {
            gap,
            step,
            cursor: gap.start,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            inserted: 0,
            requests: 0,
        }
    }

    /// The gap being filled.
    #[must_use]
    pub const fn gap(&self) -> Gap {
        self.gap
    }

    /// Next `since` to request.
    #[must_use]
    pub const fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Failed attempts at the current cursor.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts still allowed at the current cursor, the pending one included.
    #[must_use]
    pub const fn attempts_left(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// Rows written so far.
    #[must_use]
    pub const fn inserted(&self) -> u64 {
        self.inserted
    }

    /// Upstream requests issued so far, retries included.
    #[must_use]
    pub const fn requests(&self) -> u64 {
        self.requests
    }

    /// Returns true while the cursor is inside the gap.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.cursor < self.gap.end_exclusive
    }

    /// Count one upstream request.
    pub const fn record_request(&mut self) {
        self.requests += 1;
    }

    /// Judge a page fetched at the current cursor.
    #[must_use]
    pub fn on_page(
        &self,
        series: &SeriesKey,
        page: FetchPage,
        short_page: ShortPagePolicy,
        page_limit: Option<usize>,
    ) -> PageDecision {
        if page.rows.is_empty() {
            return PageDecision::EndOfHistory;
        }
        if short_page == ShortPagePolicy::Retry
            && let Some(limit) = page_limit
            && page.rows.len() < limit
            && self.attempts_left() > 1
        {
            return PageDecision::Failed(SyncError::ShortPage {
                cursor: self.cursor,
                received: page.rows.len(),
                limit,
            });
        }

        let (cursor, end) = (self.cursor, self.gap.end_exclusive);
        let rows: Vec<Candle> = page
            .rows
            .into_iter()
            .filter(|c| c.belongs_to(series) && c.is_aligned() && cursor <= c.time && c.time < end)
            .collect();
        let past_last = rows.iter().map(|c| c.time.saturating_add(self.step)).max();

        match page.continuation.max(past_last) {
            Some(next) if next > cursor => PageDecision::Write { rows, next },
            other => PageDecision::Failed(SyncError::NonProgressingCursor {
                cursor,
                next: other.unwrap_or(cursor),
            }),
        }
    }

    /// Record a write and move to `next`, resetting the attempt counter.
    pub fn advance(&mut self, next: i64, inserted: u64) {
        debug_assert!(next > self.cursor);
        self.cursor = next;
        self.attempt = 0;
        self.inserted += inserted;
    }

    /// Classify a failure at the current cursor.
    pub fn on_error(&mut self, err: SyncError) -> ErrorDecision {
        match err {
            SyncError::Cancelled => ErrorDecision::Cancel,
            e if e.is_transient() => {
                self.attempt += 1;
                if self.attempt >= self.max_attempts {
                    return ErrorDecision::Abandon(SyncError::RetriesExhausted {
                        cursor: self.cursor,
                        attempts: self.attempt,
                        last: Box::new(e),
                    });
                }
                let retry_after_ms = match e {
                    SyncError::RateLimitExceeded { retry_after_ms } => retry_after_ms,
                    _ => None,
                };
                ErrorDecision::Retry {
                    attempt: self.attempt,
                    throttled: e.is_throttle(),
                    retry_after_ms,
                }
            }
            e @ (SyncError::NonProgressingCursor { .. } | SyncError::RetriesExhausted { .. }) => {
                ErrorDecision::Abandon(e)
            }
            e => ErrorDecision::Abort(e),
        }
    }
}
