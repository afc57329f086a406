// =============================================================================
// Moving-Average Indicators
// =============================================================================
//
// Pure, side-effect-free functions over a close-price slice. Output is always
// aligned 1:1 with the input so the renderer can zip it with the candles.

pub mod ema;
pub mod sma;

pub use ema::calculate_ema;
pub use sma::calculate_sma;
