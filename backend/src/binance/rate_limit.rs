// =============================================================================
// Request-Weight Tracker — observes Binance API weight usage
// =============================================================================
//
// Binance allows 6000 request weight per minute per IP on /api/v3; a klines
// call with limit <= 100 costs 2. The dashboard never comes close, but the
// `X-MBX-USED-WEIGHT-1M` header is recorded after each call so the health
// endpoint can show it and a shared IP running out of budget is visible in
// the logs. Nothing is ever throttled here.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Weight above which every update logs a warning.
const WEIGHT_WARN_THRESHOLD: u32 = 4800;

/// Lock-free tracker updated from exchange response headers.
#[derive(Default)]
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    requests_sent: AtomicU64,
}

/// Serialisable view of the tracker for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub requests_sent: u64,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outbound request and read `X-MBX-USED-WEIGHT-1M` if present.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);

        let Some(weight) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        if weight >= WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                previous = prev,
                "exchange request weight above warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "request weight updated from header");
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight_1m.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("requests_sent", &self.requests_sent.load(Ordering::Relaxed))
            .finish()
    }
}
