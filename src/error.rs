//! Error types for the noisecorr crate.

use std::fmt;

/// Errors that can occur while correlating a station pair.
///
/// Every variant is terminal for the current invocation: a failed call never
/// returns partial results.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseError {
    /// The raw stream is split into implausibly many fragments.
    TooManyTraces { count: usize, max: usize },
    /// No usable traces or frames remain after a filtering stage.
    EmptyStream(String),
    /// The aligned trim start lies after the trim end.
    InvalidTimeRange { start: String, end: String },
    /// The correlation output is entirely zero.
    NoCorrelatedData,
    /// A configuration value is out of range.
    InvalidParameter(String),
    /// A trace violates its header invariants.
    InvalidTrace(String),
    /// Two spectra that must share a shape do not.
    ShapeMismatch { left: usize, right: usize },
    /// A station has no entry in the location table.
    MissingLocation(String),
}

impl NoiseError {
    /// Returns true for failures caused by the data of one segment.
    ///
    /// A batch driver should record these against the pair/segment and move
    /// on; anything else points at the run configuration.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            NoiseError::TooManyTraces { .. }
                | NoiseError::EmptyStream(_)
                | NoiseError::InvalidTimeRange { .. }
                | NoiseError::NoCorrelatedData
                | NoiseError::InvalidTrace(_)
        )
    }
}

impl fmt::Display for NoiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseError::TooManyTraces { count, max } => {
                write!(f, "too many traces in stream: {} (max {})", count, max)
            }
            NoiseError::EmptyStream(stage) => write!(f, "no traces in stream after {}", stage),
            NoiseError::InvalidTimeRange { start, end } => {
                write!(f, "start time {} is later than end time {}", start, end)
            }
            NoiseError::NoCorrelatedData => write!(f, "no data cross-correlated"),
            NoiseError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            NoiseError::InvalidTrace(msg) => write!(f, "invalid trace: {}", msg),
            NoiseError::ShapeMismatch { left, right } => {
                write!(f, "shape mismatch: {} vs {}", left, right)
            }
            NoiseError::MissingLocation(id) => write!(f, "no location for station {}", id),
        }
    }
}

impl std::error::Error for NoiseError {}
