use candle_sync::{FetchPage, Gap, SeriesKey, SyncConfig, SyncError, Timeframe};
use candle_sync_mock::{MockBehavior, ScriptedFetcher, candle, page};

use crate::helpers::*;

fn stale_page() -> MockBehavior<FetchPage> {
    MockBehavior::Return(page(PAIR, TF, &[A - 2 * STEP, A - STEP]))
}

#[tokio::test]
async fn rows_outside_the_gap_are_discarded() {
    let h = harness();
    h.store.seed(rows(&[A + 2 * STEP]));
    h.ctl.set_synthetic(full_history(20)).await;
    h.ctl
        .script(
            A,
            vec![MockBehavior::Return(page(
                PAIR,
                TF,
                &[A - STEP, A, A + STEP, A + 2 * STEP, A + 3 * STEP],
            ))],
        )
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(h.store.get(&series(), A - STEP).is_none());
    assert_eq!(report.inserted, 11);
    assert!(report.gaps.is_empty());
    assert_eq!(h.ctl.cursors().await, vec![A, A + 3 * STEP]);
}

#[tokio::test]
async fn foreign_and_unaligned_rows_are_never_written() {
    let h = harness();
    let mut rows = page(PAIR, TF, &[A, A + STEP]).rows;
    rows.push(candle("XBTUSD", TF, A + 2 * STEP));
    rows.push(candle(PAIR, TF, A + 2 * STEP + 7));
    h.ctl
        .script(A, vec![MockBehavior::Return(FetchPage::new(rows, None))])
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(h.store.times(&series()), vec![A, A + STEP]);
    assert!(h.store.times(&SeriesKey::new("XBTUSD", Timeframe::M15)).is_empty());
}

#[tokio::test]
async fn continuation_marker_can_jump_ahead() {
    let h = harness();
    h.ctl.set_synthetic(full_history(20)).await;
    h.ctl
        .script(
            A,
            vec![MockBehavior::Return(FetchPage::new(
                rows(&[A]),
                Some(A + 3 * STEP),
            ))],
        )
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A + 3 * STEP]);
    assert_eq!(report.gaps, vec![Gap::new(A + STEP, A + 3 * STEP, STEP)]);
    assert_eq!(report.gaps_remaining, 1);
    assert_eq!(report.inserted, 10);
}

#[tokio::test]
async fn stale_page_abandons_gap_with_non_progressing_cursor() {
    let h = harness();
    h.ctl.script(A, vec![stale_page()]).await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("non-progressing cursor"));
    assert_eq!(report.gaps_remaining, 1);
    assert!(!report.aborted);
}

#[tokio::test]
async fn repeated_stalls_abort_the_run() {
    let h = harness_with(ScriptedFetcher::new_with_controller("mock"), |b| {
        b.config(SyncConfig {
            backoff: fast_backoff(),
            fetch_timeout: None,
            non_progress_abort_after: 2,
            ..SyncConfig::default()
        })
    });
    // gaps [A, A+2S), [A+3S, A+5S) and [A+6S, B]
    h.store.seed(rows(&[A + 2 * STEP, A + 5 * STEP]));
    h.ctl.set_fallback(stale_page()).await;

    let report = h
        .sync
        .orchestrator()
        .run(&series(), Timeframe::M15, window(), &Default::default())
        .await
        .unwrap();
    assert!(report.aborted);
    assert_eq!(report.gaps_attempted, 2);
    assert_eq!(report.gaps_remaining.len(), 2);
    assert_eq!(report.gaps_deferred, vec![Gap::new(A + 6 * STEP, B + STEP, STEP)]);
    assert!(
        report
            .errors
            .iter()
            .all(|e| matches!(e, SyncError::NonProgressingCursor { .. }))
    );
}

#[tokio::test]
async fn gaps_are_visited_oldest_first() {
    let h = harness();
    h.store.seed(rows(&[A + 2 * STEP, A + 6 * STEP]));
    h.ctl.set_synthetic(full_history(1)).await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    let cursors = h.ctl.cursors().await;
    assert!(cursors.windows(2).all(|w| w[0] < w[1]), "{cursors:?}");
    assert_eq!(cursors.first(), Some(&A));
    assert_eq!(report.gaps_closed, 3);
}
