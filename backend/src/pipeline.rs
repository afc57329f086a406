// =============================================================================
// Refresh Cycle — fetch → normalize → compute → publish
// =============================================================================
//
// One cycle runs to completion before the next can start; the refresh loop
// awaits it inline, so there is never more than one klines request in
// flight. Failures are turned into a dashboard warning here and never
// escape to the loop.
// =============================================================================

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::app_state::{AppState, NO_DATA_WARNING};
use crate::binance::BinanceClient;
use crate::chart::ChartFrame;
use crate::error::PipelineError;
use crate::market_data::normalize_klines;
use crate::runtime_config::ChartParams;

/// Candle width requested from the exchange.
pub const KLINE_INTERVAL: &str = "1m";

/// Result of a cycle that did not fail.
#[derive(Debug)]
pub enum CycleOutcome {
    Frame(ChartFrame),
    /// The exchange answered with an empty list.
    NoData,
}

/// Run the pipeline once for `params` without touching shared state.
pub async fn run_cycle(
    client: &BinanceClient,
    params: &ChartParams,
    cycle_id: Uuid,
) -> Result<CycleOutcome, PipelineError> {
    let body = client
        .get_klines(
            params.symbol.as_str(),
            KLINE_INTERVAL,
            params.candle_limit.as_u32(),
        )
        .await?;

    let series = normalize_klines(&body)?;
    if series.is_empty() {
        return Ok(CycleOutcome::NoData);
    }

    Ok(CycleOutcome::Frame(ChartFrame::build(cycle_id, params, &series)))
}

/// Run one cycle with the current parameters and publish the outcome.
///
/// Returns `true` when a new chart frame was published.
pub async fn refresh_once(state: &AppState, client: &BinanceClient) -> bool {
    let cycle_id = Uuid::new_v4();
    let params = state.chart_params();
    let span = info_span!("refresh_cycle", %cycle_id, symbol = %params.symbol);

    async {
        match run_cycle(client, &params, cycle_id).await {
            Ok(CycleOutcome::Frame(frame)) => {
                info!(
                    candles = frame.len(),
                    last_close = ?frame.last_close(),
                    "chart frame published"
                );
                state.publish_frame(frame);
                true
            }
            Ok(CycleOutcome::NoData) => {
                warn!("exchange returned no candles");
                state.publish_warning(NO_DATA_WARNING);
                false
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "refresh cycle failed");
                state.record_failure(&e);
                false
            }
        }
    }
    .instrument(span)
    .await
}
