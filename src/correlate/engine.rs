//! Frequency-domain cross-correlation, deconvolution and coherence.

use log::debug;
use rustfft::num_complex::Complex;

use crate::config::Method;
use crate::core::fft::COMPLEX_ZERO;
use crate::core::signal::{FrameMatrix, SignalBatch, SpectralMatrix};
use crate::error::NoiseError;

/// Half-width of the spectral smoothing boxcar, in bins.
pub const SMOOTH_HALF_WIN: usize = 20;
/// Water level added to smoothed spectra, as a fraction of their row mean.
const WATER_LEVEL: f64 = 0.01;

/// Correlates matching rows of two spectra and keeps lags `|tau| <= maxlag`.
///
/// `maxlag` is in samples and is rounded to the nearest integer; it must
/// fit in `nfft / 2 - 1` lags. `nfft` overrides the
/// inverse transform length (default: the spectrum width). Row `i` of the
/// result has `2 * maxlag + 1` values with zero lag at the center.
///
/// # Errors
///
/// * [`NoiseError::ShapeMismatch`] if the row counts or widths differ.
/// * [`NoiseError::InvalidParameter`] if `maxlag` exceeds what `nfft` holds.
/// * [`NoiseError::NoCorrelatedData`] if the result is empty or all zero.
pub fn correlate(
    fft1: &SpectralMatrix,
    fft2: &SpectralMatrix,
    maxlag: f64,
    nfft: Option<usize>,
    method: Method,
) -> Result<FrameMatrix, NoiseError> {
    if fft1.rows() != fft2.rows() {
        return Err(NoiseError::ShapeMismatch {
            left: fft1.rows(),
            right: fft2.rows(),
        });
    }
    if fft1.nfft() != fft2.nfft() {
        return Err(NoiseError::ShapeMismatch {
            left: fft1.nfft(),
            right: fft2.nfft(),
        });
    }
    let nfft = nfft.unwrap_or(fft1.nfft());
    if fft1.rows() == 0 || nfft < 2 {
        return Err(NoiseError::NoCorrelatedData);
    }

    let mut cross = fft1.zip_with(fft2, |a, b| a * b.conj());
    match method {
        Method::CrossCorrelation => {}
        Method::Deconv => {
            let power = water_levelled(fft2, |s| s * s);
            cross = divide_rows(&cross, &power)?;
        }
        Method::Coherence => {
            let amp1 = water_levelled(fft1, |s| s);
            let amp2 = water_levelled(fft2, |s| s);
            cross = divide_rows(&divide_rows(&cross, &amp1)?, &amp2)?;
        }
    }

    let lags = lag_samples(maxlag, nfft)?;
    let raw = cross.inverse_real(nfft);
    let width = 2 * lags + 1;
    let mut data = Vec::with_capacity(raw.rows() * width);
    for row in raw.iter_rows() {
        data.extend(center_lags(row, lags));
    }
    if data.iter().all(|&v| v == 0.0) {
        return Err(NoiseError::NoCorrelatedData);
    }
    debug!(
        "{} correlation(s) over {} lag samples with {}",
        raw.rows(),
        width,
        method
    );
    FrameMatrix::from_flat(data, raw.rows(), width)
}

/// Rounds `maxlag` and checks it against the lags an `nfft` transform holds.
fn lag_samples(maxlag: f64, nfft: usize) -> Result<usize, NoiseError> {
    let requested = maxlag.max(0.0).round() as usize;
    let available = max_lag_for(nfft);
    if requested > available {
        return Err(NoiseError::InvalidParameter(format!(
            "maxlag of {} samples exceeds the {} available for nfft {}",
            requested, available, nfft
        )));
    }
    Ok(requested)
}

/// Largest lag, in samples, an `nfft` transform can hold on each side.
pub fn max_lag_for(nfft: usize) -> usize {
    (nfft / 2).saturating_sub(1)
}

/// Negative-lag tail followed by the non-negative head, cut to `+-lags`.
fn center_lags(row: &[f64], lags: usize) -> impl Iterator<Item = f64> + '_ {
    let n = row.len();
    let tail_start = (n + 1 - n / 2).min(n);
    let tail = &row[tail_start..];
    let head = &row[..(n / 2 + 1).min(n)];
    let zero = tail.len();
    tail.iter()
        .chain(head)
        .skip(zero - lags)
        .take(2 * lags + 1)
        .copied()
}

/// Boxcar moving average of width `2 * half_win + 1` with reflected edges.
///
/// Indices before the start reflect about the first sample; indices past
/// the end reflect about a point half a sample beyond the last one.
pub fn smooth(values: &[f64], half_win: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let width = (2 * half_win + 1) as f64;
    let reflect = |idx: isize| -> f64 {
        let n = n as isize;
        let i = if idx < 0 {
            -idx
        } else if idx >= n {
            2 * n - 1 - idx
        } else {
            idx
        };
        values[i.clamp(0, n - 1) as usize]
    };
    (0..n as isize)
        .map(|i| {
            let h = half_win as isize;
            (i - h..=i + h).map(reflect).sum::<f64>() / width
        })
        .collect()
}

/// Smoothed amplitude of every row, mapped by `shape`, plus the water level.
fn water_levelled(spectrum: &SpectralMatrix, shape: impl Fn(f64) -> f64) -> Vec<Vec<f64>> {
    spectrum
        .iter_rows()
        .map(|row| {
            let amplitude: Vec<f64> = row.iter().map(|c| c.norm()).collect();
            let smoothed = smooth(&amplitude, SMOOTH_HALF_WIN);
            let mean = smoothed.iter().sum::<f64>() / smoothed.len().max(1) as f64;
            smoothed
                .into_iter()
                .map(|s| shape(s) + WATER_LEVEL * mean)
                .collect()
        })
        .collect()
}

fn divide_rows(
    spectrum: &SpectralMatrix,
    denominators: &[Vec<f64>],
) -> Result<SpectralMatrix, NoiseError> {
    let nfft = spectrum.nfft();
    let mut data: Vec<Complex<f64>> = Vec::with_capacity(spectrum.as_flat().len());
    for (row, denom) in spectrum.iter_rows().zip(denominators) {
        data.extend(
            row.iter()
                .zip(denom)
                .map(|(&c, &d)| if d > 0.0 { c / d } else { COMPLEX_ZERO }),
        );
    }
    SpectralMatrix::from_flat(data, spectrum.rows(), nfft)
}
