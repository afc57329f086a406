// =============================================================================
// Dashboard Configuration — user-selected chart parameters with atomic save
// =============================================================================
//
// Holds everything the dashboard controls select: symbol, refresh interval,
// SMA window, EMA span, plus the candle count and refresh policy. The refresh
// loop re-reads it at the start of every cycle, so a change made through the
// API takes effect on the next cycle.
//
// Persistence uses an atomic tmp + rename pattern. All fields carry
// `#[serde(default)]` so that a partial or older file still loads.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{check_window, CandleLimit, RefreshInterval, RefreshPolicy, Symbol};

fn default_sma_window() -> usize {
    20
}

fn default_ema_span() -> usize {
    10
}

// =============================================================================
// DashboardConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Pair being charted.
    #[serde(default)]
    pub symbol: Symbol,

    /// Seconds between refresh cycles (10, 30 or 60).
    #[serde(default)]
    pub refresh_interval_secs: RefreshInterval,

    /// SMA window length, 5..=50.
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,

    /// EMA span, 5..=50.
    #[serde(default = "default_ema_span")]
    pub ema_span: usize,

    /// Candles requested per cycle (50 or 100).
    #[serde(default)]
    pub candle_limit: CandleLimit,

    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbol: Symbol::default(),
            refresh_interval_secs: RefreshInterval::default(),
            sma_window: default_sma_window(),
            ema_span: default_ema_span(),
            candle_limit: CandleLimit::default(),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

/// Read-only parameters for one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartParams {
    pub symbol: Symbol,
    pub candle_limit: CandleLimit,
    pub sma_window: usize,
    pub ema_span: usize,
}

impl DashboardConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Returns an error if the file is missing, unparsable, or holds an
    /// out-of-range window, so the caller can fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dashboard config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dashboard config from {}", path.display()))?;

        config
            .validate()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid dashboard config in {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            refresh_interval = %config.refresh_interval_secs,
            "dashboard config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise dashboard config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "dashboard config saved (atomic)");
        Ok(())
    }

    /// Check the fields serde cannot constrain on its own.
    pub fn validate(&self) -> std::result::Result<(), String> {
        check_window("sma_window", self.sma_window)?;
        check_window("ema_span", self.ema_span)?;
        Ok(())
    }

    pub fn chart_params(&self) -> ChartParams {
        ChartParams {
            symbol: self.symbol,
            candle_limit: self.candle_limit,
            sma_window: self.sma_window,
            ema_span: self.ema_span,
        }
    }

    /// Apply a partial update. Nothing is changed unless every supplied field
    /// is valid. Returns a human-readable list of the changes made.
    pub fn apply(&mut self, update: &ParamsUpdate) -> std::result::Result<Vec<String>, String> {
        let mut next = self.clone();

        if let Some(symbol) = update.symbol {
            next.symbol = symbol;
        }
        if let Some(interval) = update.refresh_interval_secs {
            next.refresh_interval_secs = RefreshInterval::try_from(interval)?;
        }
        if let Some(window) = update.sma_window {
            next.sma_window = window;
        }
        if let Some(span) = update.ema_span {
            next.ema_span = span;
        }
        if let Some(limit) = update.candle_limit {
            next.candle_limit = CandleLimit::try_from(limit)?;
        }
        if let Some(policy) = update.refresh_policy {
            next.refresh_policy = policy;
        }
        next.validate()?;

        let mut changes = Vec::new();
        macro_rules! diff {
            ($field:ident) => {
                if self.$field != next.$field {
                    changes.push(format!(
                        "{}: {:?} -> {:?}",
                        stringify!($field),
                        self.$field,
                        next.$field
                    ));
                }
            };
        }
        diff!(symbol);
        diff!(refresh_interval_secs);
        diff!(sma_window);
        diff!(ema_span);
        diff!(candle_limit);
        diff!(refresh_policy);

        *self = next;
        Ok(changes)
    }
}

/// Partial update posted by the dashboard controls. Numeric enums arrive as
/// raw numbers and are checked in [`DashboardConfig::apply`] so the caller
/// gets a readable message instead of a serde rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamsUpdate {
    #[serde(default)]
    pub symbol: Option<Symbol>,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub sma_window: Option<usize>,
    #[serde(default)]
    pub ema_span: Option<usize>,
    #[serde(default)]
    pub candle_limit: Option<u32>,
    #[serde(default)]
    pub refresh_policy: Option<RefreshPolicy>,
}
