use std::time::Duration;

/// Production REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";
/// Sandbox REST endpoint.
pub const SANDBOX_BASE_URL: &str = "https://api-sandbox.kraken.com";
/// Rows Kraken returns per OHLC page at most.
pub const DEFAULT_PAGE_LIMIT: usize = 720;

/// Connection settings of a [`KrakenFetcher`](crate::KrakenFetcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrakenConfig {
    /// Scheme and host, without a trailing path.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Upstream page cap, used for short-page detection.
    pub page_limit: usize,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("candle-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl KrakenConfig {
    /// Defaults pointed at the sandbox.
    #[must_use]
    pub fn sandbox() -> Self {
        Self {
            base_url: SANDBOX_BASE_URL.to_string(),
            ..Self::default()
        }
    }

    /// Override the endpoint, e.g. a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the page cap.
    #[must_use]
    pub const fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }
}
