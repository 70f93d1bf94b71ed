use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use candle_sync::{Candle, CandleStore, CandleSync, SyncError};
use candle_sync_mock::{MockBehavior, ScriptedFetcher, page};
use tokio::time::Instant;

use crate::helpers::*;

/// Store with an occupied `A + 4 * STEP`, giving gaps `[A, A+4S)` and `[A+5S, B]`.
fn split_window(h: &Harness) {
    h.store.seed(rows(&[A + 4 * STEP]));
}

fn all_times() -> Vec<i64> {
    (0..12).map(|i| A + i * STEP).collect()
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_and_abandon_only_that_gap() {
    let h = harness();
    split_window(&h);
    h.ctl.set_synthetic(full_history(10)).await;
    h.ctl
        .script(A, vec![MockBehavior::Fail(SyncError::transient("502 Bad Gateway"))])
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A, A, A + 5 * STEP]);
    assert_eq!(h.limiter.total(), 4);
    assert_eq!(report.gaps_remaining, 1);
    assert_eq!(report.gaps_closed, 1);
    assert!(!report.aborted);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("retries exhausted"), "{:?}", report.errors);
    assert_eq!(report.inserted, 7);
}

#[tokio::test(start_paused = true)]
async fn recovered_transient_failure_leaves_no_error() {
    let h = harness();
    h.ctl
        .script(
            A,
            vec![
                MockBehavior::Fail(SyncError::transient("timeout")),
                MockBehavior::Return(page(PAIR, TF, &all_times())),
            ],
        )
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(report.errors.is_empty());
    assert!(report.gaps.is_empty());
    assert_eq!(h.ctl.cursors().await, vec![A, A]);
}

#[tokio::test(start_paused = true)]
async fn upstream_throttling_honours_retry_after() {
    let h = harness();
    h.ctl
        .script(
            A,
            vec![
                MockBehavior::Fail(SyncError::throttled(Some(5_000))),
                MockBehavior::Return(page(PAIR, TF, &all_times())),
            ],
        )
        .await;

    let start = Instant::now();
    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(report.inserted, 12);
}

#[tokio::test(start_paused = true)]
async fn upstream_throttling_extends_backoff() {
    let h = harness();
    h.ctl
        .script(
            A,
            vec![
                MockBehavior::Fail(SyncError::throttled(None)),
                MockBehavior::Return(page(PAIR, TF, &all_times())),
            ],
        )
        .await;

    let start = Instant::now();
    h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    // 10ms minimum backoff times the default throttle factor of 4
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(40), "{waited:?}");
    assert!(waited < Duration::from_secs(1), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_aborts_the_run() {
    let h = harness();
    split_window(&h);
    h.ctl.set_synthetic(full_history(10)).await;
    h.ctl
        .script(
            A,
            vec![MockBehavior::Fail(SyncError::permanent(
                "EGeneral:Invalid arguments",
            ))],
        )
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(report.aborted);
    assert_eq!(h.ctl.cursors().await, vec![A]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Invalid arguments"));
    assert_eq!(report.gaps_remaining, 1);
    assert_eq!(report.gaps_deferred, 1);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.gaps.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn store_failure_aborts_the_run() {
    let h = harness();
    h.ctl.set_synthetic(full_history(5)).await;
    h.store.fail_next_upserts(1);

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(report.aborted);
    assert_eq!(h.store.upsert_calls(), 1);
    assert_eq!(h.ctl.cursors().await, vec![A]);
    assert!(report.errors[0].starts_with("store error"));
    assert_eq!(report.gaps_remaining, 1);
}

struct BrokenStore;

#[async_trait]
impl CandleStore for BrokenStore {
    async fn range_query(
        &self,
        _pair: &str,
        _timeframe_minutes: u32,
        _start: i64,
        _end: i64,
    ) -> Result<Vec<Candle>, SyncError> {
        Err(SyncError::store("database is locked"))
    }

    async fn upsert(&self, _rows: &[Candle]) -> Result<u64, SyncError> {
        Err(SyncError::store("database is locked"))
    }
}

#[tokio::test]
async fn failing_initial_scan_is_an_error() {
    let (fetcher, ctl) = ScriptedFetcher::new_with_controller("mock");
    let sync = CandleSync::builder()
        .store(Arc::new(BrokenStore))
        .fetcher(fetcher)
        .build()
        .unwrap();

    let err = sync.sync(PAIR, 15, window(), false).await.unwrap_err();
    assert_eq!(err, SyncError::store("database is locked"));
    assert!(!sync.leases().is_held(&series()));
    assert!(ctl.cursors().await.is_empty());

    let err = sync.inspect(PAIR, 15, window()).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
}
