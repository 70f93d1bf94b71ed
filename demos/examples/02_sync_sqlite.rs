use std::sync::Arc;

use candle_sync::{CandleSync, ShortPagePolicy, Window, parse_time_input};
use candle_sync_demos::common::{get_fetcher, init_tracing, now};
use candle_sync_sqlite::SqliteCandleStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // CANDLE_SYNC_DB=sqlite://data/ohlc.db to persist; in-memory otherwise.
    let store = match std::env::var("CANDLE_SYNC_DB") {
        Ok(url) => SqliteCandleStore::connect(&url).await?,
        Err(_) => SqliteCandleStore::in_memory().await?,
    };
    let since = parse_time_input(&std::env::var("CANDLE_SYNC_SINCE").unwrap_or_default())?;
    let window = Window::resolve(since, None, 2, now())?;

    let sync = CandleSync::builder()
        .store(Arc::new(store.clone()))
        .fetcher(get_fetcher().await)
        .short_page(ShortPagePolicy::Accept)
        .max_gaps_per_run(50)
        .build()?;

    let first = sync.sync("ETHUSD", 60, window, false).await?;
    println!("{}", serde_json::to_string_pretty(&first)?);

    // Second pass finds nothing new to write.
    let second = sync.sync("ETHUSD", 60, window, false).await?;
    println!(
        "second pass inserted {}, stored rows {}",
        second.inserted,
        store.count("ETHUSD", 60).await?
    );
    Ok(())
}
