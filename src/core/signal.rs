//! Single-frame and batched-frame signal containers.
//!
//! [`Frame`] (one window) and [`FrameMatrix`] (many windows, one per row)
//! share the [`SignalBatch`] interface, so the detrend / taper / filter /
//! transform chain is written once and dispatched by type rather than by
//! array rank. All operations consume the batch and return a new one.

use std::collections::HashMap;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::core::fft::COMPLEX_ZERO;
use crate::core::filter::ZeroPhaseFilter;
use crate::core::window::{apply_window, Taper};
use crate::error::NoiseError;

/// Trend removed by [`SignalBatch::detrend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detrend {
    /// Subtract the mean.
    Constant,
    /// Subtract the least-squares line.
    Linear,
}

/// Common interface of [`Frame`] and [`FrameMatrix`].
pub trait SignalBatch: Sized {
    /// Number of frames held.
    fn rows(&self) -> usize;
    /// Padded frame length.
    fn cols(&self) -> usize;
    /// Removes a constant or linear trend from every frame.
    fn detrend(self, kind: Detrend) -> Self;
    /// Multiplies every frame by `taper` sized to that frame.
    fn taper(self, taper: Taper) -> Self;
    /// Runs `filter` over every frame.
    fn filter(self, filter: &ZeroPhaseFilter) -> Self;
    /// Applies `f` to every stored sample, padding included.
    fn map_samples<F: Fn(f64) -> f64>(self, f: F) -> Self;
    /// Forward FFT of every frame, zero-padded or truncated to `nfft`.
    fn spectrum(&self, nfft: usize) -> SpectralMatrix;
}

/// One frame of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Vec<f64>,
}

impl Frame {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

impl SignalBatch for Frame {
    fn rows(&self) -> usize {
        1
    }

    fn cols(&self) -> usize {
        self.samples.len()
    }

    fn detrend(mut self, kind: Detrend) -> Self {
        detrend_slice(&mut self.samples, kind);
        self
    }

    fn taper(mut self, taper: Taper) -> Self {
        let window = taper.window(self.samples.len());
        apply_window(&mut self.samples, &window);
        self
    }

    fn filter(mut self, filter: &ZeroPhaseFilter) -> Self {
        filter.apply(&mut self.samples);
        self
    }

    fn map_samples<F: Fn(f64) -> f64>(mut self, f: F) -> Self {
        self.samples.iter_mut().for_each(|s| *s = f(*s));
        self
    }

    fn spectrum(&self, nfft: usize) -> SpectralMatrix {
        forward_rows(std::iter::once(self.samples.as_slice()), 1, nfft)
    }
}

/// Row-major matrix of frames, right-zero-padded to a common length.
///
/// Each row remembers its own valid length; detrend, taper and filter only
/// touch that prefix so the padding stays zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
    lens: Vec<usize>,
}

impl FrameMatrix {
    /// Packs frames of possibly different lengths, padding to the longest.
    pub fn from_rows<R: AsRef<[f64]>>(frames: &[R]) -> Self {
        let rows = frames.len();
        let cols = frames.iter().map(|f| f.as_ref().len()).max().unwrap_or(0);
        let lens: Vec<usize> = frames.iter().map(|f| f.as_ref().len()).collect();
        let mut data = vec![0.0; rows * cols];
        for (dst, src) in data.chunks_exact_mut(cols.max(1)).zip(frames) {
            let src = src.as_ref();
            dst[..src.len()].copy_from_slice(src);
        }
        Self {
            data,
            rows,
            cols,
            lens,
        }
    }

    /// Wraps a flat row-major buffer whose rows are all full length.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::ShapeMismatch`] if `data.len() != rows * cols`.
    pub fn from_flat(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self, NoiseError> {
        if data.len() != rows * cols {
            return Err(NoiseError::ShapeMismatch {
                left: data.len(),
                right: rows * cols,
            });
        }
        Ok(Self::full(data, rows, cols))
    }

    fn full(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        Self {
            data,
            rows,
            cols,
            lens: vec![cols; rows],
        }
    }

    /// Full padded row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Valid (unpadded) part of row `i`.
    pub fn valid_row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..i * self.cols + self.lens[i]]
    }

    /// Valid length of each row.
    pub fn row_lengths(&self) -> &[usize] {
        &self.lens
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Transforms each full padded row with `f`.
    ///
    /// A mapped row shorter than the matrix width leaves the remaining
    /// samples zero; extra values are dropped.
    pub fn map_rows<F: Fn(&[f64]) -> Vec<f64>>(mut self, f: F) -> Self {
        for i in 0..self.rows {
            let row = &mut self.data[i * self.cols..(i + 1) * self.cols];
            let mut mapped = f(row);
            mapped.resize(row.len(), 0.0);
            row.copy_from_slice(&mapped);
        }
        self
    }

    fn for_each_valid_row<F: FnMut(&mut [f64])>(&mut self, mut f: F) {
        if self.cols == 0 {
            return;
        }
        for (row, &len) in self.data.chunks_exact_mut(self.cols).zip(&self.lens) {
            f(&mut row[..len]);
        }
    }
}

impl SignalBatch for FrameMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn detrend(mut self, kind: Detrend) -> Self {
        self.for_each_valid_row(|row| detrend_slice(row, kind));
        self
    }

    fn taper(mut self, taper: Taper) -> Self {
        let mut windows: HashMap<usize, Vec<f64>> = HashMap::new();
        self.for_each_valid_row(|row| {
            let window = windows
                .entry(row.len())
                .or_insert_with(|| taper.window(row.len()));
            apply_window(row, window);
        });
        self
    }

    fn filter(mut self, filter: &ZeroPhaseFilter) -> Self {
        self.for_each_valid_row(|row| filter.apply(row));
        self
    }

    fn map_samples<F: Fn(f64) -> f64>(mut self, f: F) -> Self {
        self.data.iter_mut().for_each(|s| *s = f(*s));
        self
    }

    fn spectrum(&self, nfft: usize) -> SpectralMatrix {
        forward_rows(self.iter_rows(), self.rows, nfft)
    }
}

/// Complex row-major matrix of spectra, `rows x nfft`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralMatrix {
    data: Vec<Complex<f64>>,
    rows: usize,
    nfft: usize,
}

impl SpectralMatrix {
    /// Wraps a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::ShapeMismatch`] if `data.len() != rows * nfft`.
    pub fn from_flat(
        data: Vec<Complex<f64>>,
        rows: usize,
        nfft: usize,
    ) -> Result<Self, NoiseError> {
        if data.len() != rows * nfft {
            return Err(NoiseError::ShapeMismatch {
                left: data.len(),
                right: rows * nfft,
            });
        }
        Ok(Self { data, rows, nfft })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Transform length (row width).
    #[inline]
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    pub fn row(&self, i: usize) -> &[Complex<f64>] {
        &self.data[i * self.nfft..(i + 1) * self.nfft]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[Complex<f64>]> {
        self.data.chunks_exact(self.nfft.max(1)).take(self.rows)
    }

    pub fn as_flat(&self) -> &[Complex<f64>] {
        &self.data
    }

    /// Builds a new matrix from `f(row)` for every row.
    ///
    /// Mapped rows are zero-padded or truncated back to `nfft`.
    pub fn map_rows<F: Fn(&[Complex<f64>]) -> Vec<Complex<f64>>>(&self, f: F) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.iter_rows() {
            let mut mapped = f(row);
            mapped.resize(self.nfft, COMPLEX_ZERO);
            data.extend(mapped);
        }
        Self {
            data,
            rows: self.rows,
            nfft: self.nfft,
        }
    }

    /// Element-wise combination of two equally shaped matrices.
    pub(crate) fn zip_with<F: Fn(Complex<f64>, Complex<f64>) -> Complex<f64>>(
        &self,
        other: &SpectralMatrix,
        f: F,
    ) -> Self {
        Self {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
            rows: self.rows,
            nfft: self.nfft,
        }
    }

    /// Normalized inverse FFT of every row at length `nfft`, real part only.
    ///
    /// Rows are zero-padded or truncated to `nfft` first.
    pub fn inverse_real(&self, nfft: usize) -> FrameMatrix {
        if self.rows == 0 || nfft == 0 {
            return FrameMatrix::full(vec![], 0, nfft);
        }
        let mut buffer = vec![COMPLEX_ZERO; self.rows * nfft];
        let keep = self.nfft.min(nfft);
        for (dst, src) in buffer.chunks_exact_mut(nfft).zip(self.iter_rows()) {
            dst[..keep].copy_from_slice(&src[..keep]);
        }
        let mut planner = FftPlanner::new();
        let ifft = planner.plan_fft_inverse(nfft);
        // rustfft transforms every nfft-sized chunk of the buffer.
        ifft.process(&mut buffer);
        let scale = 1.0 / nfft as f64;
        let data = buffer.iter().map(|c| c.re * scale).collect();
        FrameMatrix::full(data, self.rows, nfft)
    }
}

fn forward_rows<'a, I>(rows: I, nrows: usize, nfft: usize) -> SpectralMatrix
where
    I: Iterator<Item = &'a [f64]>,
{
    if nrows == 0 || nfft == 0 {
        return SpectralMatrix {
            data: vec![],
            rows: nrows,
            nfft,
        };
    }
    let mut buffer = vec![COMPLEX_ZERO; nrows * nfft];
    for (dst, src) in buffer.chunks_exact_mut(nfft).zip(rows) {
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d = Complex::new(s, 0.0);
        }
    }
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nfft);
    fft.process(&mut buffer);
    SpectralMatrix {
        data: buffer,
        rows: nrows,
        nfft,
    }
}

/// Removes a constant or least-squares linear trend in place.
pub fn detrend_slice(data: &mut [f64], kind: Detrend) {
    let n = data.len();
    if n == 0 {
        return;
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    match kind {
        Detrend::Constant => data.iter_mut().for_each(|v| *v -= mean),
        Detrend::Linear => {
            if n < 2 {
                data[0] = 0.0;
                return;
            }
            let x_mean = (n - 1) as f64 / 2.0;
            let (mut sxy, mut sxx) = (0.0, 0.0);
            for (i, &v) in data.iter().enumerate() {
                let dx = i as f64 - x_mean;
                sxy += dx * (v - mean);
                sxx += dx * dx;
            }
            let slope = sxy / sxx;
            for (i, v) in data.iter_mut().enumerate() {
                *v -= mean + slope * (i as f64 - x_mean);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detrend_linear_removes_ramp() {
        let mut data: Vec<f64> = (0..100).map(|i| 3.0 + 0.5 * i as f64).collect();
        detrend_slice(&mut data, Detrend::Linear);
        assert!(data.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_detrend_constant_zero_mean() {
        let mut data = vec![1.0, 2.0, 3.0, 6.0];
        detrend_slice(&mut data, Detrend::Constant);
        assert!(data.iter().sum::<f64>().abs() < 1e-12);
        assert_eq!(data, vec![-2.0, -1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_from_rows_pads_and_tracks_lengths() {
        let m = FrameMatrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0]]);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.row(1), &[4.0, 0.0, 0.0]);
        assert_eq!(m.valid_row(1), &[4.0]);
        assert_eq!(m.row_lengths(), &[3, 1]);
    }

    #[test]
    fn test_matrix_detrend_leaves_padding() {
        let m = FrameMatrix::from_rows(&[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 7.0]])
            .detrend(Detrend::Constant);
        assert_eq!(m.row(1), &[-1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_frame_and_matrix_agree() {
        let samples: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin() + 0.01 * i as f64).collect();
        let taper = Taper::Tukey(0.2);

        let single = Frame::new(samples.clone())
            .detrend(Detrend::Linear)
            .taper(taper)
            .into_samples();
        let batch = FrameMatrix::from_rows(&[samples.clone(), samples])
            .detrend(Detrend::Linear)
            .taper(taper);

        for i in 0..2 {
            for (a, b) in single.iter().zip(batch.row(i)) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_spectrum_roundtrip() {
        let samples: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).cos()).collect();
        let m = FrameMatrix::from_rows(&[samples.clone(), samples.iter().map(|v| -v).collect()]);
        let spec = m.spectrum(32);
        assert_eq!(spec.rows(), 2);
        assert_eq!(spec.nfft(), 32);
        let back = spec.inverse_real(32);
        for (i, &v) in samples.iter().enumerate() {
            assert!((back.row(0)[i] - v).abs() < 1e-10);
            assert!((back.row(1)[i] + v).abs() < 1e-10);
        }
        for &pad in &back.row(0)[30..] {
            assert!(pad.abs() < 1e-10);
        }
    }

    #[test]
    fn test_frame_spectrum_dc_bin() {
        let spec = Frame::new(vec![1.0; 8]).spectrum(8);
        assert!((spec.row(0)[0].re - 8.0).abs() < 1e-12);
        assert!(spec.row(0)[1].norm() < 1e-12);
    }

    #[test]
    fn test_flat_shape_checked() {
        let m = FrameMatrix::from_flat(vec![1.0; 6], 2, 3).unwrap();
        assert_eq!(m.row(1), &[1.0, 1.0, 1.0]);
        assert_eq!(
            FrameMatrix::from_flat(vec![1.0; 5], 2, 3),
            Err(NoiseError::ShapeMismatch { left: 5, right: 6 })
        );
        assert!(SpectralMatrix::from_flat(vec![COMPLEX_ZERO; 7], 2, 4).is_err());
    }

    #[test]
    fn test_map_rows_keeps_width() {
        let m = FrameMatrix::from_rows(&[vec![1.0, 2.0, 3.0]]).map_rows(|row| row[..1].to_vec());
        assert_eq!(m.row(0), &[1.0, 0.0, 0.0]);
        let spec = Frame::new(vec![1.0; 8]).spectrum(8);
        let longer = spec.map_rows(|row| row.iter().chain(row).copied().collect());
        assert_eq!(longer.nfft(), 8);
        assert_eq!(longer.as_flat().len(), 8);
    }
}
