use std::sync::Arc;
use std::time::Duration;

use candle_sync::{
    CallClass, CancellationToken, CandleSync, SyncError, SyncReport, Timeframe, Window,
};
use candle_sync_mock::{InMemoryStore, MockBehavior, ScriptedFetcher};
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use crate::helpers::*;

#[test]
fn build_requires_store_and_fetcher() {
    let (fetcher, _ctl) = ScriptedFetcher::new_with_controller("mock");
    let err = CandleSync::builder().fetcher(fetcher).build().err().unwrap();
    assert!(matches!(err, SyncError::InvalidArg(ref m) if m.contains("store")));

    let err = CandleSync::builder()
        .store(Arc::new(InMemoryStore::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::InvalidArg(ref m) if m.contains("fetcher")));

    let (fetcher, _ctl) = ScriptedFetcher::new_with_controller("mock");
    let err = CandleSync::builder()
        .store(Arc::new(InMemoryStore::new()))
        .fetcher(fetcher)
        .max_attempts(0)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::InvalidArg(_)));
}

#[tokio::test]
async fn invalid_arguments_fail_before_any_io() {
    let h = harness();
    let cases = [
        ("ETHUSD", 0, window()),
        ("ETHUSD", -15, window()),
        ("ETHUSD", 15, Window::new(B, A)),
        ("  ", 15, window()),
    ];
    for (pair, tf, w) in cases {
        let err = assert_err!(h.sync.sync(pair, tf, w, false).await);
        assert!(matches!(err, SyncError::InvalidArg(_)), "{pair:?} {tf} {w:?}");
        let err = assert_err!(h.sync.inspect(pair, tf, w).await);
        assert!(matches!(err, SyncError::InvalidArg(_)));
    }
    assert_eq!(h.store.range_queries(), 0);
    assert!(h.ctl.cursors().await.is_empty());
}

#[tokio::test]
async fn dry_run_only_scans() {
    let h = harness();
    h.store.seed(rows(&[A, A + STEP, A + 4 * STEP]));
    h.ctl.set_synthetic(full_history(5)).await;

    let report = h.sync.sync(PAIR, 15, window(), true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.gaps.len(), 2);
    assert_eq!(report.inserted, 0);
    assert!(h.ctl.cursors().await.is_empty());
    assert_eq!(h.limiter.total(), 0);
    assert_eq!(h.store.upsert_calls(), 0);
}

#[tokio::test]
async fn at_most_max_gaps_per_run_are_attempted() {
    let h = harness_with(ScriptedFetcher::new_with_controller("mock"), |b| {
        b.max_gaps_per_run(1)
    });
    h.store.seed(rows(&[A + 2 * STEP, A + 6 * STEP]));
    h.ctl.set_synthetic(full_history(20)).await;

    let run = h
        .sync
        .orchestrator()
        .run(&series(), Timeframe::M15, window(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.gaps_attempted, 1);
    assert_eq!(run.gaps_closed.len(), 1);
    assert_eq!(run.gaps_deferred.len(), 2);
    assert!(!run.cancelled);

    // later runs pick up the deferred gaps
    let next = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(next.gaps_closed, 1);
    assert_eq!(next.gaps_deferred, 1);
    let last = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(last.gaps.is_empty());
}

#[tokio::test(start_paused = true)]
async fn default_limiter_spaces_requests() {
    let (fetcher, ctl) = ScriptedFetcher::new_with_controller("mock");
    ctl.set_synthetic(full_history(5)).await;
    let sync = CandleSync::builder()
        .store(Arc::new(InMemoryStore::new()))
        .fetcher(fetcher)
        .build()
        .unwrap();

    let start = Instant::now();
    let report = assert_ok!(sync.sync(PAIR, 15, window(), false).await);
    assert_eq!(ctl.cursors().await.len(), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(report.inserted, 12);
}

#[tokio::test]
async fn permits_are_charged_to_the_fetcher_call_class() {
    let h = harness_with(
        ScriptedFetcher::builder("private")
            .call_class(CallClass::Private)
            .build(),
        |b| b,
    );
    h.ctl.set_synthetic(full_history(5)).await;

    h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.limiter.granted(CallClass::Private), 3);
    assert_eq!(h.limiter.granted(CallClass::Public), 0);
}

#[tokio::test(start_paused = true)]
async fn fetch_timeout_turns_hangs_into_retries() {
    let h = harness_with(ScriptedFetcher::new_with_controller("mock"), |b| {
        b.fetch_timeout(Some(Duration::from_secs(2))).max_attempts(2)
    });
    h.ctl.set_fallback(MockBehavior::Hang).await;

    let run = h
        .sync
        .orchestrator()
        .run(&series(), Timeframe::M15, window(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A]);
    match &run.errors[..] {
        [SyncError::RetriesExhausted { attempts, last, .. }] => {
            assert_eq!(*attempts, 2);
            assert!(matches!(**last, SyncError::TransientFetch(ref m) if m.contains("timed out")));
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[tokio::test]
async fn sync_all_runs_each_series() {
    let h = harness();
    h.ctl.set_synthetic(full_history(20)).await;

    let results = h
        .sync
        .sync_all(
            &[
                ("ETHUSD".to_string(), 15),
                ("XBTUSD".to_string(), 15),
                (String::new(), 15),
            ],
            window(),
            false,
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().inserted, 12);
    assert_eq!(results[1].as_ref().unwrap().pair, "XBTUSD");
    assert_eq!(results[1].as_ref().unwrap().inserted, 12);
    assert!(matches!(results[2], Err(SyncError::InvalidArg(_))));
}

#[tokio::test]
async fn report_uses_camel_case_wire_names() {
    let h = harness();
    let report = h.sync.inspect(PAIR, 15, window()).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["pair"], "ETHUSD");
    assert_eq!(json["timeframeMinutes"], 15);
    assert_eq!(json["window"]["start"], A);
    assert_eq!(json["gaps"][0]["endExclusive"], B + STEP);
    assert_eq!(json["gaps"][0]["missingCount"], 12);
    assert_eq!(json["dryRun"], false);

    let back: SyncReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}
