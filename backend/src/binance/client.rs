// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only the unauthenticated klines endpoint is used, so no API key or request
// signing is involved. One request per call: no retries, no backoff. The next
// refresh tick is the only recovery path.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::error::FetchError;

/// Production REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Per-request timeout applied by the shared HTTP client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance REST client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    /// Create a new client talking to `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limit
    }

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Returns the parsed JSON body untouched; turning it into candles is the
    /// normalizer's job. A non-success status is reported as
    /// [`FetchError::Status`] together with whatever body the exchange sent.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Value, FetchError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, body = %body, "klines request rejected");
            return Err(FetchError::Status { status, body });
        }

        let body: Value = resp.json().await.map_err(FetchError::Body)?;

        debug!(
            symbol,
            interval,
            rows = body.as_array().map_or(0, Vec::len),
            "klines fetched"
        );
        Ok(body)
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}
