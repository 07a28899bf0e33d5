//! Detrend, taper and bandpass of finished correlation functions.

use crate::core::filter::ZeroPhaseFilter;
use crate::core::signal::{Detrend, SignalBatch};
use crate::core::window::Taper;
use crate::error::NoiseError;

/// Length of each Tukey flank, in seconds.
const TUKEY_FLANK_SECS: f64 = 20.0;

/// Cleans one correlation function or a batch of them along the lag axis.
///
/// # Errors
///
/// Returns [`NoiseError::InvalidParameter`] if the passband does not fit
/// `sampling_rate`.
pub fn clean_up<B: SignalBatch>(
    corr: B,
    sampling_rate: f64,
    freqmin: f64,
    freqmax: f64,
) -> Result<B, NoiseError> {
    let bandpass = ZeroPhaseFilter::bandpass(freqmin, freqmax, sampling_rate)?;
    let cols = corr.cols().max(1) as f64;
    let alpha = (TUKEY_FLANK_SECS * sampling_rate / cols).min(1.0);
    Ok(corr
        .detrend(Detrend::Constant)
        .detrend(Detrend::Linear)
        .taper(Taper::Tukey(alpha))
        .filter(&bandpass))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signal::{Frame, FrameMatrix};
    use std::f64::consts::PI;

    #[test]
    fn test_trend_removed_passband_kept() {
        let row: Vec<f64> = (0..401)
            .map(|i| 2.0 + 0.01 * i as f64 + (2.0 * PI * 0.1 * i as f64).sin())
            .collect();
        let out = clean_up(Frame::new(row), 1.0, 0.05, 0.2).unwrap().into_samples();
        assert_eq!(out.len(), 401);
        let mid = &out[100..300];
        let mean = mid.iter().sum::<f64>() / mid.len() as f64;
        assert!(mean.abs() < 0.1, "offset survived: {}", mean);
        let mid_peak = mid.iter().fold(0.0f64, |a, v| a.max(v.abs()));
        assert!(mid_peak > 0.5 && mid_peak < 1.5, "passband content: {}", mid_peak);
    }

    #[test]
    fn test_batch_matches_single() {
        let row: Vec<f64> = (0..201).map(|i| (i as f64 * 0.37).sin()).collect();
        let single = clean_up(Frame::new(row.clone()), 1.0, 0.05, 0.3)
            .unwrap()
            .into_samples();
        let batch = clean_up(FrameMatrix::from_rows(&[row.clone(), row]), 1.0, 0.05, 0.3).unwrap();
        for (a, b) in single.iter().zip(batch.row(1)) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_band() {
        assert!(clean_up(Frame::new(vec![1.0; 50]), 1.0, 0.6, 0.8).is_err());
    }
}
