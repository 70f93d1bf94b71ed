use std::time::Duration;

use candle_sync::{FetchPage, Gap, LeasePolicy, SyncError, Window};
use candle_sync_mock::{MockBehavior, ScriptedFetcher, SyntheticHistory};

use crate::helpers::*;

#[tokio::test]
async fn empty_store_is_one_gap_over_the_window() {
    let h = harness();
    let report = h.sync.inspect(PAIR, 15, window()).await.unwrap();

    assert_eq!(
        report.gaps,
        vec![Gap {
            start: A,
            end_exclusive: 1_731_773_700,
            missing_count: 12,
        }]
    );
    assert_eq!(report.coverage.expected, 12);
    assert_eq!(report.coverage.present, 0);
    assert_eq!(report.coverage.missing, 12);
    assert_eq!(report.coverage.ratio, 0.0);
}

#[tokio::test]
async fn internal_and_trailing_gaps() {
    let h = harness();
    h.store.seed(rows(&[A, A + STEP, A + 4 * STEP]));

    let report = h.sync.inspect(PAIR, 15, window()).await.unwrap();
    assert_eq!(
        report.gaps,
        vec![
            Gap {
                start: 1_731_764_700,
                end_exclusive: 1_731_766_500,
                missing_count: 2,
            },
            Gap {
                start: 1_731_767_400,
                end_exclusive: 1_731_773_700,
                missing_count: 7,
            },
        ]
    );
    assert_eq!(report.coverage.present, 3);
    assert_eq!(report.coverage.missing, 9);
    assert_eq!(report.coverage.ratio, 0.25);
}

#[tokio::test]
async fn unaligned_start_snaps_to_next_grid_point() {
    let h = harness();
    let scan = h.sync.scanner().scan(PAIR, 15, A + 33, B).await.unwrap();

    assert_eq!(scan.aligned, Some(Window::new(1_731_763_800, B)));
    assert_eq!(scan.coverage.expected, 11);
    assert_eq!(scan.gaps, vec![Gap::new(1_731_763_800, B + STEP, STEP)]);
}

#[tokio::test]
async fn window_without_grid_point_skips_the_store() {
    let h = harness();
    let scan = h.sync.scanner().scan(PAIR, 15, A + 1, A + 899).await.unwrap();

    assert_eq!(scan.aligned, None);
    assert!(scan.gaps.is_empty());
    assert_eq!(scan.coverage.expected, 0);
    assert_eq!(scan.coverage.ratio, 1.0);
    assert_eq!(h.store.range_queries(), 0);
}

#[tokio::test]
async fn zero_rows_at_gap_start_closes_gap_without_error() {
    let h = harness();
    h.ctl
        .script(A, vec![MockBehavior::Return(FetchPage::empty())])
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(report.gaps_closed, 1);
    assert_eq!(report.gaps_remaining, 0);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.inserted, 0);
    assert_eq!(h.ctl.cursors().await, vec![A]);
}

#[tokio::test]
async fn end_of_history_mid_gap_keeps_what_was_written() {
    let h = harness();
    h.ctl
        .set_synthetic(SyntheticHistory::new(A, A + 5 * STEP, 4))
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A + 4 * STEP, A + 6 * STEP]);
    assert_eq!(report.inserted, 6);
    assert_eq!(report.gaps_closed, 1);
    assert_eq!(report.gaps, vec![Gap::new(A + 6 * STEP, B + STEP, STEP)]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_sync_waits_for_the_lease() {
    let h = harness();
    h.ctl.set_synthetic(full_history(5)).await;
    h.ctl.set_latency(Duration::from_millis(50)).await;

    let (first, second) = tokio::join!(
        h.sync.sync(PAIR, 15, window(), false),
        h.sync.sync(PAIR, 15, window(), false),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.inserted, 12);
    assert_eq!(second.inserted, 0);
    assert!(first.gaps.is_empty() && second.gaps.is_empty());

    let cursors = h.ctl.cursors().await;
    let mut unique = cursors.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), cursors.len(), "duplicate cursor in {cursors:?}");
    assert_eq!(cursors, vec![A, A + 5 * STEP, A + 10 * STEP]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_sync_is_rejected_under_reject_policy() {
    let h = harness_with(ScriptedFetcher::new_with_controller("mock"), |b| {
        b.lease_policy(LeasePolicy::Reject)
    });
    h.ctl.set_synthetic(full_history(5)).await;
    h.ctl.set_latency(Duration::from_millis(50)).await;

    let (first, second) = tokio::join!(
        h.sync.sync(PAIR, 15, window(), false),
        h.sync.sync(PAIR, 15, window(), false),
    );
    assert_eq!(first.unwrap().inserted, 12);
    assert_eq!(
        second.unwrap_err(),
        SyncError::LeaseHeld {
            pair: PAIR.into(),
            timeframe_minutes: TF,
        }
    );
    assert!(!h.sync.leases().is_held(&series()));

    // released once the first run is done
    let third = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(third.inserted, 0);
    assert_eq!(h.ctl.cursors().await.len(), 3);
}
