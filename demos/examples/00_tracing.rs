use std::sync::Arc;

use candle_sync::{CandleSync, Window};
use candle_sync_demos::common::{get_fetcher, now};
use candle_sync_mock::InMemoryStore;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,candle_sync=debug
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .try_init();

    let sync = CandleSync::builder()
        .store(Arc::new(InMemoryStore::new()))
        .fetcher(get_fetcher().await)
        .build()?;

    // last six hours of 15m candles
    let window = Window::resolve(Some(now() - 6 * 3_600), None, 1, now())?;
    let before = sync.inspect("ETHUSD", 15, window).await?;
    println!("before: {} gaps, {} missing", before.gaps.len(), before.coverage.missing);

    let after = sync.sync("ETHUSD", 15, window, false).await?;
    println!(
        "after: inserted {}, {} gaps left, errors {:?}",
        after.inserted,
        after.gaps.len(),
        after.errors
    );
    Ok(())
}
