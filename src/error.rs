//! Error type shared by the driver, the display engine and the pattern loaders.
//!
//! ## Rust concepts
//! - `derive_more` to generate `Display` and `std::error::Error`
//! - Enum variants carrying the context needed to log a failure

use derive_more::derive::{Display, Error};
use std::time::Duration;

/// Everything that can go wrong while driving the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MatrixError {
    /// A pin could not be claimed as an output, or the configuration is
    /// unusable. Fatal at startup.
    #[display("configuration error: {_0}")]
    Configuration(#[error(not(source))] String),

    /// A grid or register vector does not match the configured size.
    /// The operation was skipped and the previous state kept.
    #[display("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// The refresh thread did not exit within the grace period.
    #[display("refresh loop did not stop within {} ms", _0.as_millis())]
    ShutdownTimeout(#[error(not(source))] Duration),

    /// Writing a GPIO line failed mid-transfer.
    #[display("gpio write failed: {_0}")]
    Pin(#[error(not(source))] String),

    /// A pattern file could not be read or decoded.
    #[display("pattern error: {_0}")]
    Pattern(#[error(not(source))] String),
}

impl MatrixError {
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{expected} bits"),
            actual: format!("{actual} bits"),
        }
    }

    pub fn grid_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn grid_mismatch_reads_rows_by_cols() {
        let err = MatrixError::grid_mismatch((8, 8), (7, 8));
        assert_eq!(err.to_string(), "dimension mismatch: expected 8x8, got 7x8");
    }

    #[test]
    fn errors_have_no_source() {
        use std::error::Error as _;
        let err = MatrixError::Pin("line 13 stuck".to_string());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "gpio write failed: line 13 stuck");
    }

    #[test]
    fn shutdown_timeout_reports_millis() {
        let err = MatrixError::ShutdownTimeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "refresh loop did not stop within 2000 ms");
    }
}
