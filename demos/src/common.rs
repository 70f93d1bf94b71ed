use std::sync::Arc;

use candle_sync::UpstreamFetcher;
use candle_sync_kraken::KrakenFetcher;
use candle_sync_mock::{ScriptedFetcher, SyntheticHistory};

/// Set to run every demo offline against synthetic history.
pub const USE_MOCK_ENV: &str = "CANDLE_SYNC_DEMOS_USE_MOCK";

/// Returns true when demos should stay offline.
#[must_use]
pub fn use_mock() -> bool {
    std::env::var(USE_MOCK_ENV).is_ok()
}

/// Current time, UNIX seconds.
#[must_use]
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Return an upstream fetcher for demos.
///
/// With `CANDLE_SYNC_DEMOS_USE_MOCK` set, a fetcher serving gapless
/// synthetic candles for the last 30 days; otherwise Kraken.
///
/// # Panics
/// Panics if the Kraken HTTP client cannot be built.
pub async fn get_fetcher() -> Arc<dyn UpstreamFetcher> {
    if use_mock() {
        println!("--- (Using synthetic upstream for CI) ---");
        let (fetcher, ctl) = ScriptedFetcher::builder("synthetic").page_limit(720).build();
        let now = now();
        ctl.set_synthetic(SyntheticHistory::new(now - 30 * 86_400, now, 720))
            .await;
        fetcher
    } else {
        Arc::new(KrakenFetcher::new_default().expect("kraken http client"))
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
