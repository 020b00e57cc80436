//! Error taxonomy for the redaction pipeline.
//!
//! Recoverable errors (`DetectorError`, `CacheError`) never abort a call to
//! [`crate::engine::RedactionEngine::redact`]; they are captured into the
//! report as warnings. `InvalidInput`, `OperationCancelled`, and
//! `InternalInvariantViolation` abort the call.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Document too large, non-UTF-8, or otherwise unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid threshold range, unknown filter type, calibration version mismatch.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Recoverable per-detector failure. Never propagates out of `redact`;
    /// the detector's span set is treated as empty and this is logged.
    #[error("detector '{detector}' failed: {message}")]
    DetectorError { detector: String, message: String },

    /// Calibration fit or inference failure.
    #[error("calibration error: {0}")]
    CalibrationError(String),

    /// Insufficient labeled samples to fit a calibrator (below `minDataPoints`).
    #[error("insufficient calibration data: have {have}, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// Cache I/O or serialization failure. Never blocks detection.
    #[error("cache error: {0}")]
    CacheError(String),

    /// Cooperative cancellation or timeout.
    #[error("operation cancelled: {0}")]
    OperationCancelled(String),

    /// A span, merge, or ordering invariant was violated. This is a bug;
    /// the operation fails fast rather than producing corrupted output.
    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    /// A span's bounds do not satisfy `start < end <= document length`.
    #[error("invalid span position: start={start}, end={end}, len={len}")]
    InvalidSpanPosition {
        start: usize,
        end: usize,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        log::warn!("serialization failure captured as CacheError: {err}");
        Error::CacheError(format!("serialization: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        log::warn!("io failure captured as CacheError: {err}");
        Error::CacheError(format!("io: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_span_position_message() {
        let err = Error::InvalidSpanPosition {
            start: 5,
            end: 3,
            len: 10,
        };
        assert!(err.to_string().contains("start=5"));
    }

    #[test]
    fn detector_error_is_recoverable_shape() {
        let err = Error::DetectorError {
            detector: "ssn".into(),
            message: "regex timeout".into(),
        };
        match err {
            Error::DetectorError { detector, .. } => assert_eq!(detector, "ssn"),
            _ => panic!("expected DetectorError"),
        }
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::CacheError(_)));
    }
}
