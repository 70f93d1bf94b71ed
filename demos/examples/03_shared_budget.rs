use std::sync::Arc;

use candle_sync::{
    CancellationToken, CandleSync, RateBudget, RateLimitConfig, TokenBucketLimiter, Window,
};
use candle_sync_demos::common::{get_fetcher, init_tracing, now};
use candle_sync_mock::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // One budget shared by every series: at most 2 calls per second.
    let limiter = Arc::new(TokenBucketLimiter::new(RateLimitConfig {
        public: RateBudget::per_second(2),
        private: None,
    }));
    let sync = CandleSync::builder()
        .store(Arc::new(InMemoryStore::new()))
        .fetcher(get_fetcher().await)
        .limiter(limiter)
        .build()?;

    let window = Window::resolve(Some(now() - 12 * 3_600), None, 1, now())?;
    let series = [
        ("ETHUSD".to_string(), 15),
        ("XBTUSD".to_string(), 15),
        ("ETHUSD".to_string(), 60),
    ];
    let cancel = CancellationToken::new();
    for result in sync.sync_all(&series, window, false, &cancel).await {
        match result {
            Ok(report) => println!(
                "{}/{}m: inserted {}, {} gaps left",
                report.pair,
                report.timeframe_minutes,
                report.inserted,
                report.gaps.len()
            ),
            Err(e) => println!("failed: {e}"),
        }
    }
    Ok(())
}
