//! Core types, time handling, filters, windows, and transform utilities.

pub mod fft;
pub mod filter;
pub mod resample;
pub mod signal;
pub mod time;
pub mod types;
pub mod window;

pub use signal::{Detrend, Frame, FrameMatrix, SignalBatch, SpectralMatrix};
pub use time::{nearest_step, Timestamp};
pub use types::*;
pub use window::Taper;
