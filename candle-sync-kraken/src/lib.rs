//! candle-sync-kraken
//!
//! [`UpstreamFetcher`] over Kraken's public `OHLC` endpoint.
//!
//! Overview
//! - One request per page: `GET {base}/0/public/OHLC?pair=&interval=&since=`.
//! - Rows are normalized into [`Candle`](candle_sync_core::Candle) under the
//!   requested pair, whichever key Kraken answers with (`XETHZUSD` for
//!   `ETHUSD`). See [`pairs`].
//! - Failures are classified for the orchestrator: throttling, transient
//!   (5xx, timeouts, connect errors, undecodable bodies, `EService`) and
//!   permanent (other 4xx, `EQuery`, `EGeneral`). See [`response`].
//!
//! Pages hold at most 720 rows; `last` in the response becomes the page
//! continuation.
//!
//! Examples
//! ```rust,ignore
//! use candle_sync_kraken::{KrakenConfig, KrakenFetcher};
//! use candle_sync_core::UpstreamFetcher;
//!
//! let kraken = KrakenFetcher::new(KrakenConfig::default())?;
//! let page = kraken.fetch("ETHUSD", 15, 1_731_762_900).await?;
//! ```
#![warn(missing_docs)]

mod config;
pub mod pairs;
pub mod response;

use async_trait::async_trait;
use candle_sync_core::{CallClass, FetchPage, SyncError, UpstreamFetcher};
use reqwest::header::RETRY_AFTER;
use url::Url;

pub use config::{DEFAULT_BASE_URL, DEFAULT_PAGE_LIMIT, KrakenConfig, SANDBOX_BASE_URL};

/// Intervals (minutes) the OHLC endpoint serves.
pub const SUPPORTED_INTERVALS: [u32; 9] = [1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

const OHLC_PATH: &str = "0/public/OHLC";

/// Kraken public OHLC fetcher.
///
/// `reqwest::Client` is `Clone + Send + Sync`; share one fetcher per process.
#[derive(Clone)]
pub struct KrakenFetcher {
    http: reqwest::Client,
    endpoint: Url,
    cfg: KrakenConfig,
}

impl std::fmt::Debug for KrakenFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

fn check_interval(timeframe_minutes: u32) -> Result<(), SyncError> {
    if SUPPORTED_INTERVALS.contains(&timeframe_minutes) {
        Ok(())
    } else {
        Err(SyncError::invalid_arg(format!(
            "kraken does not serve {timeframe_minutes}m candles; supported: {SUPPORTED_INTERVALS:?}"
        )))
    }
}

fn map_transport_err(e: &reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::transient(format!("kraken request timed out: {e}"))
    } else if e.is_connect() {
        SyncError::transient(format!("kraken connect failed: {e}"))
    } else {
        SyncError::transient(format!("kraken request failed: {e}"))
    }
}

fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(secs.saturating_mul(1_000))
}

impl KrakenFetcher {
    /// Fetcher over `cfg`.
    ///
    /// # Errors
    /// Returns `InvalidArg` when `base_url` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(cfg: KrakenConfig) -> Result<Self, SyncError> {
        let base = Url::parse(&cfg.base_url)
            .map_err(|e| SyncError::invalid_arg(format!("bad kraken base url: {e}")))?;
        let endpoint = base
            .join(OHLC_PATH)
            .map_err(|e| SyncError::invalid_arg(format!("bad kraken base url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| SyncError::invalid_arg(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            endpoint,
            cfg,
        })
    }

    /// Fetcher against the production endpoint with default settings.
    ///
    /// # Errors
    /// See [`new`](Self::new).
    pub fn new_default() -> Result<Self, SyncError> {
        Self::new(KrakenConfig::default())
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &KrakenConfig {
        &self.cfg
    }

    /// Full request URL for one page.
    #[must_use]
    pub fn ohlc_url(&self, pair: &str, timeframe_minutes: u32, since: i64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("pair", pair)
            .append_pair("interval", &timeframe_minutes.to_string())
            .append_pair("since", &since.max(0).to_string());
        url
    }
}

#[async_trait]
impl UpstreamFetcher for KrakenFetcher {
    fn name(&self) -> &'static str {
        "kraken"
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "candle_sync::kraken::fetch", skip(self))
    )]
    async fn fetch(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        since: i64,
    ) -> Result<FetchPage, SyncError> {
        check_interval(timeframe_minutes)?;
        let url = self.ohlc_url(pair, timeframe_minutes, since);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_err(&e))?;
        let status = resp.status();
        let retry_after = retry_after_ms(resp.headers());
        let body = resp
            .text()
            .await
            .map_err(|e| map_transport_err(&e))?;

        if !status.is_success() {
            let err = response::classify_status(status.as_u16(), retry_after, &body);
            #[cfg(feature = "tracing")]
            tracing::warn!(status = status.as_u16(), error = %err, "kraken request rejected");
            return Err(err);
        }
        response::parse_ohlc(&body, pair, timeframe_minutes)
    }

    fn page_limit(&self) -> Option<usize> {
        Some(self.cfg.page_limit)
    }

    fn call_class(&self) -> CallClass {
        CallClass::Public
    }
}
