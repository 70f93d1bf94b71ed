use crate::{CoverageSummary, Gap, ScanReport, Window, grid_points};

/// Snap `window` to the grid of `step` seconds.
///
/// Returns the smallest multiple of `step` at or after `window.start` and the
/// largest multiple at or before `window.end`, or `None` when no grid point
/// lies inside the window (including on arithmetic overflow).
///
/// ```
/// use candle_sync_core::{align_window, Window};
///
/// let aligned = align_window(Window::new(1_731_762_933, 1_731_772_800), 900);
/// assert_eq!(aligned, Some(Window::new(1_731_763_800, 1_731_772_800)));
/// assert_eq!(align_window(Window::new(901, 1_799), 900), None);
/// ```
#[must_use]
pub fn align_window(window: Window, step: i64) -> Option<Window> {
    if step <= 0 || window.end < window.start {
        return None;
    }
    let rem = window.start.rem_euclid(step);
    let start = if rem == 0 {
        window.start
    } else {
        window.start.checked_add(step - rem)?
    };
    let end = window.end.checked_sub(window.end.rem_euclid(step))?;
    (start <= end).then_some(Window::new(start, end))
}

/// Sweep ascending present open times into the gaps of `window`.
///
/// `present` must be ascending. Times before the sweep cursor (stale
/// duplicates), off the grid, or outside the aligned window are skipped and
/// not counted as present. The result satisfies
/// `expected == present + missing` and lists gaps strictly ascending and
/// non-overlapping.
#[must_use]
pub fn sweep<I>(window: Window, step: i64, present: I) -> ScanReport
where
    I: IntoIterator<Item = i64>,
{
    let Some(aligned) = align_window(window, step) else {
        return ScanReport {
            window,
            aligned: None,
            gaps: Vec::new(),
            coverage: CoverageSummary::EMPTY,
        };
    };

    let expected = grid_points(aligned.start, aligned.end, step);
    let mut gaps = Vec::new();
    let mut consumed: u64 = 0;
    let mut cursor = aligned.start;

    for p in present {
        if p < cursor || p > aligned.end || p.rem_euclid(step) != 0 {
            #[cfg(feature = "tracing")]
            tracing::debug!(time = p, cursor, "skipping stale or malformed stored time");
            continue;
        }
        if cursor < p {
            gaps.push(Gap::new(cursor, p, step));
        }
        consumed += 1;
        cursor = p.saturating_add(step);
    }
    if cursor <= aligned.end {
        gaps.push(Gap::through(cursor, aligned.end, step));
    }

    ScanReport {
        window,
        aligned: Some(aligned),
        gaps,
        coverage: CoverageSummary::from_counts(expected, consumed),
    }
}
