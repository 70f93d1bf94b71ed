use std::sync::Arc;

use candle_sync::{CandleStore, Gap, GapScanner};
use candle_sync_mock::{InMemoryStore, SyntheticHistory};
use proptest::prelude::*;

use crate::helpers::*;

#[tokio::test]
async fn empty_store_converges_in_one_run() {
    let h = harness();
    h.ctl.set_synthetic(full_history(4)).await;

    let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert!(report.gaps.is_empty());
    assert!(report.coverage.is_complete());
    assert_eq!(report.inserted, 12);
    assert_eq!(report.gaps_closed, 1);
    assert!(report.errors.is_empty());
    assert_eq!(h.store.times(&series()), (0..12).map(|i| A + i * STEP).collect::<Vec<_>>());

    // one permit per request
    let calls = h.ctl.cursors().await.len() as u64;
    assert_eq!(h.limiter.total(), calls);

    // a second run has nothing to do
    let again = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(h.ctl.cursors().await.len() as u64, calls);
}

#[tokio::test]
async fn upstream_hole_stays_open_without_looping() {
    let h = harness();
    let hole = A + 3 * STEP;
    h.ctl
        .set_synthetic(full_history(4).with_holes([hole]))
        .await;

    let first = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(first.inserted, 11);
    assert_eq!(first.gaps, vec![Gap::new(hole, hole + STEP, STEP)]);
    assert_eq!(first.gaps_remaining, 1);
    assert_eq!(first.gaps_closed, 0);

    let before = h.ctl.cursors().await.len();
    let second = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.gaps_remaining, 1);
    assert_eq!(h.ctl.cursors().await.len(), before + 1);
}

#[tokio::test]
async fn upserted_rows_are_seen_by_the_next_scan() {
    let store = InMemoryStore::new();
    let scanner = GapScanner::new(Arc::new(store.clone()));
    let page = SyntheticHistory::new(A, B, 5).page(PAIR, TF, A + 2 * STEP);

    assert_eq!(store.upsert(&page.rows).await.unwrap(), 5);
    assert_eq!(store.upsert(&page.rows).await.unwrap(), 0);

    let scan = scanner.scan(PAIR, 15, A, B).await.unwrap();
    assert_eq!(
        scan.gaps,
        vec![
            Gap::new(A, A + 2 * STEP, STEP),
            Gap::new(A + 7 * STEP, B + STEP, STEP),
        ]
    );
    for c in &page.rows {
        assert!(scan.gaps.iter().all(|g| !g.contains(c.time)));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_partial_store_converges(
        present in proptest::collection::btree_set(0i64..12, 0..12),
        page_size in 1usize..8,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let h = harness();
            let seeded: Vec<i64> = present.iter().map(|i| A + i * STEP).collect();
            h.store.seed(rows(&seeded));
            h.ctl.set_synthetic(full_history(page_size)).await;

            let report = h.sync.sync(PAIR, 15, window(), false).await.unwrap();
            prop_assert!(report.gaps.is_empty(), "gaps left: {:?}", report.gaps);
            prop_assert_eq!(report.inserted, 12 - seeded.len() as u64);
            prop_assert_eq!(report.gaps_remaining, 0);

            let cursors = h.ctl.cursors().await;
            prop_assert!(cursors.windows(2).all(|w| w[0] < w[1]), "{:?}", cursors);
            Ok(())
        })?;
    }
}
