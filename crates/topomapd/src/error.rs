//! Error types for topomapd
//!
//! The two build entry points fail with exactly two conditions,
//! [`TopomapError::EmptyInput`] and [`TopomapError::MissingDeviceId`]. Every
//! other malformed row is dropped locally and never surfaces here. The
//! remaining variants belong to the configuration and CLI layers.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-11: Error Handling - Build errors carry an observation index, not its content
//! - AU-3: Content of Audit Records - Error context for logging

use thiserror::Error;

/// Errors that can occur in topomapd
#[derive(Debug, Error)]
pub enum TopomapError {
    /// No observations were supplied to a build call
    #[error("no device observations supplied")]
    EmptyInput,

    /// An observation has an empty device identifier
    #[error("observation at position {index} has no device id")]
    MissingDeviceId { index: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Observation or result (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TopomapError {
    /// Returns true for the errors a build call can produce.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TopomapError::EmptyInput | TopomapError::MissingDeviceId { .. }
        )
    }
}

/// Result type alias for topomapd operations
pub type Result<T> = std::result::Result<T, TopomapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TopomapError::EmptyInput.to_string(),
            "no device observations supplied"
        );
        assert_eq!(
            TopomapError::MissingDeviceId { index: 3 }.to_string(),
            "observation at position 3 has no device id"
        );
        assert_eq!(
            TopomapError::Config("bad level".to_string()).to_string(),
            "Configuration error: bad level"
        );
    }

    #[test]
    fn test_is_input_error() {
        assert!(TopomapError::EmptyInput.is_input_error());
        assert!(TopomapError::MissingDeviceId { index: 0 }.is_input_error());
        assert!(!TopomapError::Config("x".to_string()).is_input_error());
    }
}
