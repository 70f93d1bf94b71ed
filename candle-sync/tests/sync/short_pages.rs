use candle_sync::ShortPagePolicy;
use candle_sync_mock::{MockBehavior, ScriptedFetcher, page};

use crate::helpers::*;

fn paged_harness(policy: ShortPagePolicy) -> Harness {
    harness_with(ScriptedFetcher::builder("mock").page_limit(5).build(), |b| {
        b.short_page(policy)
    })
}

fn short_page() -> MockBehavior<candle_sync::FetchPage> {
    MockBehavior::Return(page(PAIR, TF, &[A, A + STEP]))
}

#[tokio::test(start_paused = true)]
async fn accept_policy_advances_past_short_page() {
    let h = paged_harness(ShortPagePolicy::Accept);
    h.ctl.set_synthetic(full_history(5)).await;
    h.ctl.script(A, vec![short_page()]).await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A + 2 * STEP, A + 7 * STEP]);
    assert_eq!(report.inserted, 12);
    assert!(report.errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn retry_policy_refetches_short_page() {
    let h = paged_harness(ShortPagePolicy::Retry);
    h.ctl.set_synthetic(full_history(5)).await;
    let full = (0..5).map(|i| A + i * STEP).collect::<Vec<_>>();
    h.ctl
        .script(A, vec![short_page(), MockBehavior::Return(page(PAIR, TF, &full))])
        .await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A, A + 5 * STEP, A + 10 * STEP]);
    assert_eq!(report.inserted, 12);
    assert!(report.errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn retry_policy_accepts_short_page_on_last_attempt() {
    let h = paged_harness(ShortPagePolicy::Retry);
    h.ctl.set_synthetic(full_history(5)).await;
    h.ctl.script(A, vec![short_page()]).await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(
        h.ctl.cursors().await,
        vec![A, A, A, A + 2 * STEP, A + 7 * STEP]
    );
    assert_eq!(report.inserted, 12);
    assert!(report.errors.is_empty());
    assert_eq!(h.limiter.total(), 5);
}

#[tokio::test(start_paused = true)]
async fn fetcher_without_page_limit_never_has_short_pages() {
    let h = harness_with(ScriptedFetcher::new_with_controller("mock"), |b| {
        b.short_page(ShortPagePolicy::Retry)
    });
    h.ctl.set_synthetic(full_history(5)).await;
    h.ctl.script(A, vec![short_page()]).await;

    h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(h.ctl.cursors().await, vec![A, A + 2 * STEP, A + 7 * STEP]);
}
