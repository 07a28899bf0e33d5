#![forbid(unsafe_code)]
//! Ambient-noise cross-correlation of continuous seismic recordings.
//!
//! `noisecorr` takes two raw, possibly gappy recordings of the same
//! channel at two stations and turns them into a matrix of correlation
//! functions, one row per time window. Along the way it repairs short gaps,
//! downsamples, aligns both stations to a common window grid, normalizes
//! each window in time, whitens its spectrum and finally cross-correlates,
//! deconvolves or computes coherence in the frequency domain.
//!
//! # Quick Start
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use noisecorr::{compute_cc, CorrelationParams, Stream, TimeNorm, Trace, TraceHeader};
//!
//! // two hours of deterministic "noise" at 1 Hz, recorded identically at both stations
//! let start = Utc.with_ymd_and_hms(2017, 1, 13, 0, 0, 0).unwrap();
//! let data: Vec<f64> = (0..7201).map(|i| ((i * 7919) % 101) as f64 - 50.0).collect();
//! let make = |sta: &str| {
//!     let header = TraceHeader::new("XX", sta, "BHZ", 1.0, start);
//!     Stream::new(vec![Trace::new(header, data.clone()).unwrap()])
//! };
//!
//! let params = CorrelationParams::new(50.0, 1.0, 0.01, 0.2).with_time_norm(TimeNorm::None);
//! let output = compute_cc(make("A"), make("B"), &params).unwrap();
//!
//! assert_eq!(output.windows.len(), 3);
//! assert_eq!(output.lags().len(), 101);
//! ```
//!
//! # Errors
//!
//! Every stage returns [`NoiseError`]. [`NoiseError::is_data_error`] tells a
//! batch driver whether to skip the segment or abort the run.

pub mod config;
pub mod core;
pub mod correlate;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod stream;

pub use config::{CorrelationParams, Method, TimeNorm};
pub use crate::core::types::{QualityMetrics, Stream, TimeWindow, Trace, TraceHeader};
pub use crate::core::Timestamp;
pub use error::NoiseError;
pub use metadata::{cross_corr_parameters, CorrelationHeader, StationLocation};
pub use pipeline::{compute_cc, CorrelationOutput, ResponseRequest};
