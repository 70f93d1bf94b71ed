use std::sync::Arc;

use candle_sync::{CandleSync, Window};
use candle_sync_demos::common::{get_fetcher, init_tracing, now};
use candle_sync_mock::{InMemoryStore, candle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // A store holding every other 15m candle of the last day.
    let store = InMemoryStore::new();
    let window = Window::resolve(None, None, 1, now())?;
    let first = window.start - window.start.rem_euclid(900) + 900;
    store.seed((first..=window.end).step_by(1_800).map(|t| candle("ETHUSD", 15, t)));

    let sync = CandleSync::builder()
        .store(Arc::new(store))
        .fetcher(get_fetcher().await)
        .build()?;

    // Coverage only; no fetch, no write.
    let report = sync.inspect("ETHUSD", 15, window).await?;
    println!(
        "coverage {}/{} ({:.1}%), {} gaps",
        report.coverage.present,
        report.coverage.expected,
        report.coverage.ratio * 100.0,
        report.gaps.len()
    );
    for gap in report.gaps.iter().take(3) {
        println!("  gap [{}, {}) missing {}", gap.start, gap.end_exclusive, gap.missing_count);
    }

    let dry = sync.sync("ETHUSD", 15, window, true).await?;
    println!("{}", serde_json::to_string_pretty(&dry)?);
    Ok(())
}
