// =============================================================================
// Pipeline error types
// =============================================================================
//
// A refresh cycle can fail in exactly two ways: the exchange call failed
// (`FetchError`) or the body it returned was not a valid kline batch
// (`NormalizeError`). Both end the current cycle only; the refresh loop keeps
// running and the next tick tries again.
// =============================================================================

use thiserror::Error;

/// The single HTTP call to the klines endpoint failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The exchange answered with a non-success status code.
    #[error("exchange returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to exchange failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// A 2xx response whose body could not be read as JSON.
    #[error("failed to read exchange response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// The response body did not have the documented kline shape.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("klines response is not an array")]
    NotAnArray,

    #[error("kline row {row} is not an array")]
    RowNotAnArray { row: usize },

    #[error("kline row {row} has {found} fields, expected {expected}")]
    FieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("kline row {row} has an invalid open time: {value}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("kline row {row} field '{field}' is not a number: {value}")]
    InvalidNumber {
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// Any failure that ends a refresh cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl PipelineError {
    /// Short warning shown above the chart.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "Error fetching data from Binance API",
            Self::Normalize(_) => "Malformed market data received from Binance API",
        }
    }

    /// Machine-readable code recorded in the error log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Status { .. }) => "fetch_status",
            Self::Fetch(_) => "fetch_transport",
            Self::Normalize(_) => "normalize",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_code() {
        let err = FetchError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn pipeline_error_maps_to_user_message() {
        let err: PipelineError = NormalizeError::NotAnArray.into();
        assert_eq!(err.code(), "normalize");
        assert!(err.user_message().starts_with("Malformed"));

        let err: PipelineError = FetchError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        }
        .into();
        assert_eq!(err.code(), "fetch_status");
        assert_eq!(err.user_message(), "Error fetching data from Binance API");
    }
}
