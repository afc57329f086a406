// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices than the SMA does.
//
// Formula (recursive, no bias correction of early terms):
//   alpha  = 2 / (span + 1)
//   EMA_0  = close_0
//   EMA_t  = alpha * close_t + (1 - alpha) * EMA_{t-1}
//
// The series is seeded with the first close, not with an SMA, so it is
// defined from index 0 and has the same length as the input.
// =============================================================================

/// Smoothing factor for a given `span`.
pub fn smoothing_factor(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Compute the EMA series for `closes` with the given `span`.
///
/// Returns an empty `Vec` for empty input; otherwise one value per close.
pub fn calculate_ema(closes: &[f64], span: usize) -> Vec<f64> {
    let Some((&first, rest)) = closes.split_first() else {
        return Vec::new();
    };

    let alpha = smoothing_factor(span);
    let mut result = Vec::with_capacity(closes.len());
    result.push(first);

    let mut prev = first;
    for &close in rest {
        let ema = alpha * close + (1.0 - alpha) * prev;
        result.push(ema);
        prev = ema;
    }

    result
}
