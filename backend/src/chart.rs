// =============================================================================
// Chart Frame — what the browser renderer receives for one refresh cycle
// =============================================================================
//
// The candles are flattened into parallel arrays (the shape a candlestick
// trace takes) and each overlay line is aligned 1:1 with them. Missing SMA
// points serialise as `null`, never as a numeric placeholder, so the chart
// leaves a gap instead of plotting zero.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::indicators::{calculate_ema, calculate_sma};
use crate::market_data::CandleSeries;
use crate::runtime_config::ChartParams;
use crate::types::Symbol;

const SMA_COLOR: &str = "blue";
const EMA_COLOR: &str = "orange";

/// One line series drawn over the candles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayLine {
    /// Legend label, e.g. `SMA-20`.
    pub name: String,
    pub color: &'static str,
    pub values: Vec<Option<f64>>,
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartFrame {
    pub cycle_id: Uuid,
    pub symbol: Symbol,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub time: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub sma: OverlayLine,
    pub ema: OverlayLine,
}

impl ChartFrame {
    /// Compute both indicators over `series` and package the result.
    pub fn build(cycle_id: Uuid, params: &ChartParams, series: &CandleSeries) -> Self {
        let candles = series.candles();
        let closes = series.closes();

        let sma = calculate_sma(&closes, params.sma_window);
        let ema = calculate_ema(&closes, params.ema_span)
            .into_iter()
            .map(Some)
            .collect();

        Self {
            cycle_id,
            symbol: params.symbol,
            title: format!("{} - 1 Min Candlestick Chart", params.symbol),
            generated_at: Utc::now(),
            time: candles.iter().map(|c| c.open_time).collect(),
            open: candles.iter().map(|c| c.open).collect(),
            high: candles.iter().map(|c| c.high).collect(),
            low: candles.iter().map(|c| c.low).collect(),
            close: closes,
            sma: OverlayLine {
                name: format!("SMA-{}", params.sma_window),
                color: SMA_COLOR,
                values: sma,
            },
            ema: OverlayLine {
                name: format!("EMA-{}", params.ema_span),
                color: EMA_COLOR,
                values: ema,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;
    use crate::types::CandleLimit;

    fn series(closes: &[f64]) -> CandleSeries {
        CandleSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Candle {
                    open_time: DateTime::<Utc>::from_timestamp_millis(i as i64 * 60_000).unwrap(),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1.0,
                    close_time: i as i64 * 60_000 + 59_999,
                })
                .collect(),
        )
    }

    fn params(sma_window: usize, ema_span: usize) -> ChartParams {
        ChartParams {
            symbol: Symbol::BtcUsdt,
            candle_limit: CandleLimit::Fifty,
            sma_window,
            ema_span,
        }
    }

    #[test]
    fn five_closes_give_aligned_series() {
        let closes = [10.0, 20.0, 30.0, 40.0, 50.0];
        let frame = ChartFrame::build(Uuid::nil(), &params(3, 2), &series(&closes));

        assert_eq!(frame.len(), 5);
        assert_eq!(frame.close.len(), 5);
        assert_eq!(frame.sma.values.len(), 5);
        assert_eq!(frame.ema.values.len(), 5);

        assert_eq!(
            frame.sma.values,
            vec![None, None, Some(20.0), Some(30.0), Some(40.0)]
        );
        let expected_ema: Vec<Option<f64>> =
            calculate_ema(&closes, 2).into_iter().map(Some).collect();
        assert_eq!(frame.ema.values, expected_ema);
    }

    #[test]
    fn missing_sma_serialises_as_null() {
        let frame = ChartFrame::build(Uuid::nil(), &params(3, 2), &series(&[1.0, 2.0, 3.0]));
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json["sma"]["values"][0].is_null());
        assert!(json["sma"]["values"][1].is_null());
        assert_eq!(json["sma"]["values"][2], 2.0);
        assert_eq!(json["ema"]["values"][0], 1.0);
    }

    #[test]
    fn labels_include_parameters() {
        let frame = ChartFrame::build(Uuid::nil(), &params(20, 10), &series(&[1.0]));
        assert_eq!(frame.sma.name, "SMA-20");
        assert_eq!(frame.ema.name, "EMA-10");
        assert_eq!(frame.title, "BTCUSDT - 1 Min Candlestick Chart");
        assert_eq!(frame.sma.color, "blue");
        assert_eq!(frame.ema.color, "orange");
    }
}
