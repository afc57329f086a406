// =============================================================================
// candle-dash — Main Entry Point
// =============================================================================
//
// Polls Binance for the latest one-minute candles of the selected pair,
// computes an SMA and an EMA over the closes, and serves a live candlestick
// dashboard that redraws after every refresh cycle.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod chart;
mod error;
mod indicators;
mod market_data;
mod pipeline;
mod refresh;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::runtime_config::DashboardConfig;
use crate::types::Symbol;

const DEFAULT_CONFIG_PATH: &str = "dashboard_config.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8501";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("candle-dash starting up");

    let config_path =
        std::env::var("CANDLEDASH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut config = DashboardConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        DashboardConfig::default()
    });

    if let Ok(sym) = std::env::var("CANDLEDASH_SYMBOL") {
        match sym.parse::<Symbol>() {
            Ok(symbol) => config.symbol = symbol,
            Err(e) => warn!(error = %e, "Ignoring CANDLEDASH_SYMBOL"),
        }
    }

    info!(
        symbol = %config.symbol,
        refresh_interval = %config.refresh_interval_secs,
        sma_window = config.sma_window,
        ema_span = config.ema_span,
        policy = %config.refresh_policy,
        "Dashboard parameters"
    );

    // ── 2. Exchange client & shared state ────────────────────────────────
    let base_url = std::env::var("CANDLEDASH_BINANCE_URL")
        .unwrap_or_else(|_| binance::DEFAULT_BASE_URL.into());
    let client = BinanceClient::new(base_url)?;

    let state = Arc::new(AppState::new(
        config,
        &config_path,
        client.rate_limit().clone(),
    ));

    // ── 3. Refresh loop ──────────────────────────────────────────────────
    let refresh_task = tokio::spawn(refresh::run_refresh_loop(state.clone(), client));

    // ── 4. Dashboard server ──────────────────────────────────────────────
    let bind_addr =
        std::env::var("CANDLEDASH_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard server on {bind_addr}"))?;
    info!(addr = %bind_addr, "Dashboard listening");

    let app = api::rest::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server failed");
        }
    });

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    refresh_task.abort();
    server.abort();

    if let Err(e) = state.config.read().save(&state.config_path) {
        error!(error = %e, "Failed to save dashboard config on shutdown");
    }

    info!("candle-dash shut down complete.");
    Ok(())
}
