use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::NormalizeError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Number of positional fields in one Binance kline row.
///
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades,
///   [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume, [11] ignore
pub const KLINE_FIELDS: usize = 12;

/// A single one-minute OHLCV candle.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Epoch milliseconds; carried along but unused by the indicators.
    pub close_time: i64,
}

/// Candles for one refresh cycle, ascending by open time as the exchange
/// returns them. Ordering is not re-checked here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Close-price projection fed to the indicators.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Convert the raw klines body (array of 12-field arrays) into a
/// [`CandleSeries`].
///
/// The whole batch is rejected on the first malformed row; no partial series
/// is ever returned. Output order and length equal the input's.
pub fn normalize_klines(body: &Value) -> Result<CandleSeries, NormalizeError> {
    let rows = body.as_array().ok_or(NormalizeError::NotAnArray)?;

    let candles = rows
        .iter()
        .enumerate()
        .map(|(row, entry)| parse_row(row, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CandleSeries::new(candles))
}

fn parse_row(row: usize, entry: &Value) -> Result<Candle, NormalizeError> {
    let fields = entry
        .as_array()
        .ok_or(NormalizeError::RowNotAnArray { row })?;

    if fields.len() != KLINE_FIELDS {
        return Err(NormalizeError::FieldCount {
            row,
            expected: KLINE_FIELDS,
            found: fields.len(),
        });
    }

    let open_time = fields[0]
        .as_i64()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| NormalizeError::InvalidTimestamp {
            row,
            value: fields[0].to_string(),
        })?;

    Ok(Candle {
        open_time,
        open: parse_f64(row, "open", &fields[1])?,
        high: parse_f64(row, "high", &fields[2])?,
        low: parse_f64(row, "low", &fields[3])?,
        close: parse_f64(row, "close", &fields[4])?,
        volume: parse_f64(row, "volume", &fields[5])?,
        close_time: fields[6].as_i64().unwrap_or(0),
    })
}

/// Binance sends prices as JSON strings; plain numbers are accepted as well.
fn parse_f64(row: usize, field: &'static str, val: &Value) -> Result<f64, NormalizeError> {
    let parsed = match val {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| NormalizeError::InvalidNumber {
            row,
            field,
            value: val.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
