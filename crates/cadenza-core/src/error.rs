//! Error types for cadenza-core.

use thiserror::Error;

/// Why a marker list was rejected by [`WarpMap::build`](crate::WarpMap::build).
///
/// Indices refer to positions in the list as supplied by the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkerError {
    #[error("clip duration {0} must be finite and positive")]
    InvalidClipDuration(f64),

    #[error("marker {index} has a non-finite time")]
    NonFinite { index: usize },

    #[error("marker {index} has a negative time (source={source_time}, target={target_time})")]
    NegativeTime {
        index: usize,
        source_time: f64,
        target_time: f64,
    },

    #[error("marker {index} maps source {source_time} onto target 0, collapsing the clip start")]
    CollapsedOrigin { index: usize, source_time: f64 },

    #[error("marker {index} source time {source_time} lies beyond the clip end {clip_duration}")]
    OutOfClip {
        index: usize,
        source_time: f64,
        clip_duration: f64,
    },

    #[error("marker {index} source time {source_time} precedes the previous marker ({previous})")]
    Unsorted {
        index: usize,
        source_time: f64,
        previous: f64,
    },

    #[error("marker {index} target time {target_time} precedes the previous marker ({previous})")]
    NonMonotonicTarget {
        index: usize,
        target_time: f64,
        previous: f64,
    },

    #[error("markers {first} and {second} share source time {source_time} with different targets")]
    AmbiguousSource {
        first: usize,
        second: usize,
        source_time: f64,
    },

    #[error("markers {first} and {second} map different source times onto target {target_time}")]
    CollapsedTarget {
        first: usize,
        second: usize,
        target_time: f64,
    },
}

/// Error type for cadenza operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid warp markers: {0}")]
    InvalidMarkers(#[from] MarkerError),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Insufficient data: {operation} needs at least {required} samples, got {available}")]
    InsufficientData {
        operation: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Algorithm failure: {0}")]
    Algorithm(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse classification of an [`Error`], used by job workers to record failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Validation,
    InsufficientData,
    Algorithm,
    UnsupportedConfiguration,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidMarkers(_) | Error::InvalidParameter { .. } => ErrorKind::Validation,
            Error::InsufficientData { .. } => ErrorKind::InsufficientData,
            Error::Algorithm(_) => ErrorKind::Algorithm,
            Error::UnsupportedConfiguration(_) => ErrorKind::UnsupportedConfiguration,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Reject a parameter that is not finite or lies outside `[min, max]`.
pub fn ensure_in_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid(name, format!("{value} is not finite")));
    }
    if value < min || value > max {
        return Err(Error::invalid(
            name,
            format!("{value} outside allowed range [{min}, {max}]"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: Error = MarkerError::InvalidClipDuration(0.0).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::InsufficientData {
                operation: "render",
                required: 2048,
                available: 10
            }
            .kind(),
            ErrorKind::InsufficientData
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_ensure_in_range() {
        assert!(ensure_in_range("strength", 0.5, 0.0, 1.0).is_ok());
        assert!(ensure_in_range("strength", 1.5, 0.0, 1.0).is_err());
        assert!(ensure_in_range("strength", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_display_mentions_parameter() {
        let err = ensure_in_range("pitch_shift_semitones", 30.0, -24.0, 24.0).unwrap_err();
        assert!(err.to_string().contains("pitch_shift_semitones"));
    }
}
