// =============================================================================
// Shared types used across the dashboard
// =============================================================================
//
// Every user-selectable parameter is a closed set. The numeric enums
// serialise as plain numbers so the dashboard page can post `30` instead of
// `"Secs30"`.
// =============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest accepted SMA window / EMA span.
pub const MIN_WINDOW: usize = 5;
/// Largest accepted SMA window / EMA span.
pub const MAX_WINDOW: usize = 50;

/// Trading pairs the dashboard can chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "BTCUSDT")]
    BtcUsdt,
    #[serde(rename = "ETHUSDT")]
    EthUsdt,
    #[serde(rename = "BNBUSDT")]
    BnbUsdt,
}

impl Symbol {
    pub const ALL: [Symbol; 3] = [Symbol::BtcUsdt, Symbol::EthUsdt, Symbol::BnbUsdt];

    /// Exchange ticker, e.g. `BTCUSDT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BtcUsdt => "BTCUSDT",
            Self::EthUsdt => "ETHUSDT",
            Self::BnbUsdt => "BNBUSDT",
        }
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::BtcUsdt
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|sym| sym.as_str() == upper)
            .ok_or_else(|| format!("unsupported symbol '{s}'"))
    }
}

/// How often the chart refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum RefreshInterval {
    Secs10,
    Secs30,
    Secs60,
}

impl RefreshInterval {
    pub fn as_secs(&self) -> u64 {
        match self {
            Self::Secs10 => 10,
            Self::Secs30 => 30,
            Self::Secs60 => 60,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::Secs30
    }
}

impl TryFrom<u64> for RefreshInterval {
    type Error = String;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        match secs {
            10 => Ok(Self::Secs10),
            30 => Ok(Self::Secs30),
            60 => Ok(Self::Secs60),
            other => Err(format!(
                "refresh interval must be one of 10, 30 or 60 seconds, got {other}"
            )),
        }
    }
}

impl From<RefreshInterval> for u64 {
    fn from(interval: RefreshInterval) -> Self {
        interval.as_secs()
    }
}

impl std::fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Number of one-minute candles requested per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CandleLimit {
    Fifty,
    Hundred,
}

impl CandleLimit {
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Fifty => 50,
            Self::Hundred => 100,
        }
    }
}

impl Default for CandleLimit {
    fn default() -> Self {
        Self::Fifty
    }
}

impl TryFrom<u32> for CandleLimit {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            50 => Ok(Self::Fifty),
            100 => Ok(Self::Hundred),
            other => Err(format!("candle limit must be 50 or 100, got {other}")),
        }
    }
}

impl From<CandleLimit> for u32 {
    fn from(limit: CandleLimit) -> Self {
        limit.as_u32()
    }
}

/// Which refresh policy the background loop follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Run a cycle, then sleep for the full interval.
    FixedSleep,
    /// Poll once a second and run when `now - last_refresh > interval`.
    ElapsedCheck,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::ElapsedCheck
    }
}

impl std::fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedSleep => write!(f, "fixed_sleep"),
            Self::ElapsedCheck => write!(f, "elapsed_check"),
        }
    }
}

/// Validate an SMA window or EMA span against `[MIN_WINDOW, MAX_WINDOW]`.
pub fn check_window(name: &str, value: usize) -> Result<usize, String> {
    if (MIN_WINDOW..=MAX_WINDOW).contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "{name} must be between {MIN_WINDOW} and {MAX_WINDOW}, got {value}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_serialises_as_ticker() {
        let json = serde_json::to_string(&Symbol::EthUsdt).unwrap();
        assert_eq!(json, "\"ETHUSDT\"");
        let sym: Symbol = serde_json::from_str("\"BNBUSDT\"").unwrap();
        assert_eq!(sym, Symbol::BnbUsdt);
    }

    #[test]
    fn symbol_rejects_unknown_ticker() {
        assert!(serde_json::from_str::<Symbol>("\"SOLUSDT\"").is_err());
        assert!("solusdt".parse::<Symbol>().is_err());
        assert_eq!("btcusdt".parse::<Symbol>().unwrap(), Symbol::BtcUsdt);
    }

    #[test]
    fn refresh_interval_accepts_only_known_values() {
        let iv: RefreshInterval = serde_json::from_str("60").unwrap();
        assert_eq!(iv, RefreshInterval::Secs60);
        assert_eq!(iv.as_duration(), Duration::from_secs(60));
        assert!(serde_json::from_str::<RefreshInterval>("15").is_err());
        assert_eq!(serde_json::to_string(&RefreshInterval::Secs10).unwrap(), "10");
    }

    #[test]
    fn candle_limit_accepts_only_known_values() {
        assert_eq!(CandleLimit::try_from(100).unwrap(), CandleLimit::Hundred);
        assert!(CandleLimit::try_from(75).is_err());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        assert!(check_window("sma_window", 5).is_ok());
        assert!(check_window("sma_window", 50).is_ok());
        assert!(check_window("sma_window", 4).is_err());
        assert!(check_window("ema_span", 51).is_err());
    }
}
