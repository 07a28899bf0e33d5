//! Window normalization, whitening and the correlation itself.

pub mod engine;
pub mod normalize;
pub mod postfilter;
pub mod whiten;

pub use engine::{correlate, smooth};
pub use normalize::{process_cc, NormalizedFrames};
pub use postfilter::clean_up;
pub use whiten::{whiten, WhiteningBand};
