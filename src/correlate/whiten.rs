//! Spectral whitening: flattens amplitude inside the passband, keeps phase.

use std::f64::consts::{FRAC_PI_2, PI};

use log::debug;
use rustfft::num_complex::Complex;

use crate::core::fft::{linspace, next_fast_len, positive_frequencies, COMPLEX_ZERO};
use crate::core::signal::{SignalBatch, SpectralMatrix};
use crate::error::NoiseError;

/// Width of each cosine ramp outside the passband, in bins.
const RAMP_BINS: usize = 100;

/// Bin layout of the whitening mask.
///
/// `[0, low)` is zeroed, `[low, left)` ramps up, `[left, right)` is flat,
/// `[right, high)` ramps down and `[high, nfft)` is zeroed before the
/// negative half is rebuilt from the positive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhiteningBand {
    pub low: usize,
    pub left: usize,
    pub right: usize,
    pub high: usize,
}

impl WhiteningBand {
    /// Locates `[freqmin, freqmax]` among the positive bins of an `nfft` transform.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidParameter`] if no positive bin falls in
    /// the band.
    pub fn new(nfft: usize, delta: f64, freqmin: f64, freqmax: f64) -> Result<Self, NoiseError> {
        let freqs = positive_frequencies(nfft, delta);
        let in_band = |f: &f64| *f >= freqmin && *f <= freqmax;
        let left = freqs.iter().position(in_band);
        let right = freqs.iter().rposition(in_band);
        let (Some(left), Some(right)) = (left, right) else {
            return Err(NoiseError::InvalidParameter(format!(
                "no frequency bins between {} and {} Hz for nfft {} at {} s",
                freqmin, freqmax, nfft, delta
            )));
        };
        let low = left.saturating_sub(RAMP_BINS).max(1).min(left);
        let high = (right + RAMP_BINS).min(nfft / 2).max(right);
        Ok(Self {
            low,
            left,
            right,
            high,
        })
    }

    /// Whitens one spectrum row of length `nfft`.
    fn apply(&self, row: &[Complex<f64>]) -> Vec<Complex<f64>> {
        let nfft = row.len();
        let half = nfft / 2;
        let unit = |k: usize, weight: f64| Complex::from_polar(weight, row[k].arg());

        let ramp_up = linspace(FRAC_PI_2, PI, self.left - self.low);
        let ramp_down = linspace(0.0, FRAC_PI_2, self.high - self.right);

        let mut positive = Vec::with_capacity(nfft);
        positive.extend(std::iter::repeat(COMPLEX_ZERO).take(self.low));
        positive.extend(
            (self.low..self.left)
                .zip(&ramp_up)
                .map(|(k, x)| unit(k, x.cos().powi(2))),
        );
        positive.extend((self.left..self.right).map(|k| unit(k, 1.0)));
        positive.extend(
            (self.right..self.high)
                .zip(&ramp_down)
                .map(|(k, x)| unit(k, x.cos().powi(2))),
        );
        positive.resize(nfft, COMPLEX_ZERO);

        if half < 1 {
            return positive;
        }
        // bins above the positive half mirror [1, half) conjugated
        let keep = nfft + 1 - half;
        let mut out = Vec::with_capacity(nfft);
        out.extend_from_slice(&positive[..keep]);
        out.extend((1..half).rev().map(|k| positive[k].conj()));
        out
    }
}

/// Forward transform of every frame, optionally whitened in `[freqmin, freqmax]`.
///
/// `nfft` defaults to the next 2-3-5-smooth length of the frame width.
///
/// # Errors
///
/// Returns [`NoiseError::InvalidParameter`] if whitening is requested and
/// the band holds no bins.
pub fn whiten<B: SignalBatch>(
    data: &B,
    delta: f64,
    freqmin: f64,
    freqmax: f64,
    to_whiten: bool,
    nfft: Option<usize>,
) -> Result<SpectralMatrix, NoiseError> {
    let nfft = nfft.unwrap_or_else(|| next_fast_len(data.cols()));
    let spectrum = data.spectrum(nfft);
    if !to_whiten {
        return Ok(spectrum);
    }
    let band = WhiteningBand::new(nfft, delta, freqmin, freqmax)?;
    debug!(
        "whitening {} row(s), nfft {}, bins {:?}",
        spectrum.rows(),
        nfft,
        band
    );
    Ok(spectrum.map_rows(|row| band.apply(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signal::{Frame, FrameMatrix};

    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_band_layout() {
        let band = WhiteningBand::new(1000, 1.0, 0.0995, 0.2005).unwrap();
        assert_eq!(band.left, 100);
        assert_eq!(band.right, 200);
        assert_eq!(band.low, 1);
        assert_eq!(band.high, 300);

        let edge = WhiteningBand::new(1000, 1.0, 0.4495, 0.4905).unwrap();
        assert_eq!(edge.high, 500);
        assert_eq!(edge.low, 350);
    }

    #[test]
    fn test_empty_band_rejected() {
        assert!(matches!(
            WhiteningBand::new(100, 1.0, 0.6, 0.8),
            Err(NoiseError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_hermitian_symmetry() {
        for &len in &[600usize, 601] {
            let m = FrameMatrix::from_rows(&[noise(len, 1), noise(len, 2)]);
            let spec = whiten(&m, 0.5, 0.05, 0.4, true, None).unwrap();
            let nfft = spec.nfft();
            assert_eq!(nfft, next_fast_len(len));
            for row in spec.iter_rows() {
                for k in 1..nfft / 2 {
                    let d = row[nfft - k] - row[k].conj();
                    assert!(d.norm() < 1e-12, "bin {} of nfft {} not mirrored", k, nfft);
                }
            }
        }
    }

    #[test]
    fn test_flat_amplitude_in_band() {
        let frame = Frame::new(noise(1000, 7));
        let spec = whiten(&frame, 1.0, 0.0995, 0.2005, true, Some(1000)).unwrap();
        let row = spec.row(0);
        for k in 100..200 {
            assert!((row[k].norm() - 1.0).abs() < 1e-12, "bin {}", k);
        }
        assert_eq!(row[0], COMPLEX_ZERO);
        for k in 300..=500 {
            assert_eq!(row[k], COMPLEX_ZERO, "bin {}", k);
        }
        // ramps stay within [0, 1]
        for k in 1..300 {
            assert!(row[k].norm() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_whitening_disabled_returns_raw_spectrum() {
        let frame = Frame::new(noise(64, 3));
        let raw = frame.spectrum(64);
        let out = whiten(&frame, 1.0, 0.1, 0.2, false, Some(64)).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_phase_preserved() {
        let frame = Frame::new(noise(1000, 11));
        let raw = frame.spectrum(1000);
        let white = whiten(&frame, 1.0, 0.0995, 0.2005, true, Some(1000)).unwrap();
        for k in 100..200 {
            let d = (white.row(0)[k].arg() - raw.row(0)[k].arg()).abs();
            assert!(d < 1e-9, "bin {} phase moved by {}", k, d);
        }
    }
}
