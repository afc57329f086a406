// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_i = (close_{i-w+1} + ... + close_i) / w
//
// Each window is summed on its own rather than with a running sum so the
// value is bit-identical to a naive mean of that window.
// =============================================================================

/// Compute the trailing SMA of `closes` over `window` points.
///
/// The result has the same length as `closes`. Positions where the window is
/// not yet full are `None`.
///
/// # Edge cases
/// - `window == 0` => every position is `None`
/// - `closes.len() < window` => every position is `None`
pub fn calculate_sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; closes.len()];
    }

    closes
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < window {
                None
            } else {
                let slice = &closes[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn naive_mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn sma_empty_input() {
        assert!(calculate_sma(&[], 5).is_empty());
    }

    #[test]
    fn sma_shorter_than_window_is_all_missing() {
        let out = calculate_sma(&[1.0, 2.0, 3.0, 4.0], 5);
        assert_eq!(out, vec![None; 4]);
    }

    #[test]
    fn sma_window_zero_is_all_missing() {
        assert_eq!(calculate_sma(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn sma_known_values() {
        let out = calculate_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn sma_matches_naive_window_mean_exactly() {
        // Prices with many decimals, where a running sum would drift.
        let closes: Vec<f64> = (0..60)
            .map(|i| 29_000.0 + (i as f64 * 0.37).sin() * 123.456_789)
            .collect();
        let window = 7;
        let out = calculate_sma(&closes, window);

        assert_eq!(out.len(), closes.len());
        for (i, value) in out.iter().enumerate() {
            if i + 1 < window {
                assert!(value.is_none(), "index {i} should be missing");
            } else {
                let expected = naive_mean(&closes[i + 1 - window..=i]);
                assert_eq!(*value, Some(expected), "mismatch at index {i}");
            }
        }
    }

    #[test]
    fn sma_window_equals_length() {
        let out = calculate_sma(&[2.0, 4.0, 6.0], 3);
        assert_eq!(out, vec![None, None, Some(4.0)]);
    }
}
