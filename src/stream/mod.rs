//! Conditioning and windowing of raw station recordings.

pub mod conditioner;
pub mod windower;

pub use conditioner::{process_raw, xyz_to_zne};
pub use windower::{match_frames, slide, trim, window_starts, WindowedTrace};
