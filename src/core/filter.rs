//! Zero-phase Butterworth filters built from cascaded biquad sections.
//!
//! Every filter is applied forward and then backward over the whole slice,
//! which cancels the phase response and squares the magnitude response. The
//! 4-corner designs therefore roll off at 48 dB/oct after the two passes.

use std::f64::consts::PI;

use log::warn;

use crate::error::NoiseError;

/// Q factors of the two sections of a 4th-order Butterworth response.
const BUTTERWORTH_Q4: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376_6];

/// A single biquad (second-order IIR) section.
///
/// Implements the Direct Form I difference equation:
///   y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
///
/// Coefficients are pre-normalized by a0. The delay line lives on the stack
/// of [`Biquad::run`], so a section can be shared between passes and rows.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn lowpass(freq: f64, sampling_rate: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sampling_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn highpass(freq: f64, sampling_rate: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sampling_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Filters `data` in place starting from a zeroed delay line.
    fn run(&self, data: &mut [f64]) {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        for sample in data.iter_mut() {
            let input = *sample;
            let output =
                self.b0 * input + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = input;
            y2 = y1;
            y1 = output;
            *sample = output;
        }
    }
}

/// A zero-phase Butterworth filter (lowpass, highpass or bandpass).
#[derive(Debug, Clone)]
pub struct ZeroPhaseFilter {
    sections: Vec<Biquad>,
}

impl ZeroPhaseFilter {
    /// Creates a bandpass between `freqmin` and `freqmax` (Hz).
    ///
    /// If `freqmax` reaches the Nyquist frequency the upper corner is dropped
    /// and the filter degrades to a highpass at `freqmin`.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidParameter`] if the corners are not
    /// positive and ordered, or `freqmin` lies at or above Nyquist.
    pub fn bandpass(freqmin: f64, freqmax: f64, sampling_rate: f64) -> Result<Self, NoiseError> {
        validate_rate(sampling_rate)?;
        if !(freqmin > 0.0 && freqmin < freqmax) {
            return Err(NoiseError::InvalidParameter(format!(
                "bandpass corners must satisfy 0 < freqmin < freqmax, got [{}, {}]",
                freqmin, freqmax
            )));
        }
        let nyquist = 0.5 * sampling_rate;
        if freqmin >= nyquist {
            return Err(NoiseError::InvalidParameter(format!(
                "freqmin {} Hz is above Nyquist {} Hz",
                freqmin, nyquist
            )));
        }
        if freqmax >= nyquist {
            warn!(
                "freqmax {} Hz at or above Nyquist {} Hz, applying highpass only",
                freqmax, nyquist
            );
            return Ok(Self::highpass_sections(freqmin, sampling_rate));
        }
        let mut sections = Self::highpass_sections(freqmin, sampling_rate).sections;
        sections.extend(Self::lowpass_sections(freqmax, sampling_rate).sections);
        Ok(Self { sections })
    }

    /// Creates a lowpass at `freq` (Hz).
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidParameter`] unless `0 < freq < Nyquist`.
    pub fn lowpass(freq: f64, sampling_rate: f64) -> Result<Self, NoiseError> {
        validate_rate(sampling_rate)?;
        if !(freq > 0.0 && freq < 0.5 * sampling_rate) {
            return Err(NoiseError::InvalidParameter(format!(
                "lowpass corner {} Hz outside (0, {})",
                freq,
                0.5 * sampling_rate
            )));
        }
        Ok(Self::lowpass_sections(freq, sampling_rate))
    }

    fn lowpass_sections(freq: f64, sampling_rate: f64) -> Self {
        Self {
            sections: BUTTERWORTH_Q4
                .iter()
                .map(|&q| Biquad::lowpass(freq, sampling_rate, q))
                .collect(),
        }
    }

    fn highpass_sections(freq: f64, sampling_rate: f64) -> Self {
        Self {
            sections: BUTTERWORTH_Q4
                .iter()
                .map(|&q| Biquad::highpass(freq, sampling_rate, q))
                .collect(),
        }
    }

    /// Filters `data` forward and backward in place.
    pub fn apply(&self, data: &mut [f64]) {
        for section in &self.sections {
            section.run(data);
        }
        data.reverse();
        for section in &self.sections {
            section.run(data);
        }
        data.reverse();
    }

    /// Filters a copy of `data`.
    pub fn apply_copy(&self, data: &[f64]) -> Vec<f64> {
        let mut out = data.to_vec();
        self.apply(&mut out);
        out
    }
}

fn validate_rate(sampling_rate: f64) -> Result<(), NoiseError> {
    if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
        return Err(NoiseError::InvalidParameter(format!(
            "sampling rate must be positive, got {}",
            sampling_rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sampling_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sampling_rate).sin())
            .collect()
    }

    fn energy(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_bandpass_passes_center_rejects_outside() {
        let sr = 20.0;
        let filter = ZeroPhaseFilter::bandpass(0.5, 2.0, sr).unwrap();
        let len = 8000;
        let settle = 1000;

        let pass = sine(1.0, sr, len);
        let low = sine(0.05, sr, len);
        let high = sine(8.0, sr, len);

        let pass_out = filter.apply_copy(&pass);
        let low_out = filter.apply_copy(&low);
        let high_out = filter.apply_copy(&high);

        let ratio_pass = energy(&pass_out[settle..len - settle]) / energy(&pass[settle..len - settle]);
        let ratio_low = energy(&low_out[settle..len - settle]) / energy(&low[settle..len - settle]);
        let ratio_high = energy(&high_out[settle..len - settle]) / energy(&high[settle..len - settle]);

        assert!(ratio_pass > 0.8, "1 Hz should pass, ratio {ratio_pass:.4}");
        assert!(ratio_low < 0.01, "0.05 Hz should be rejected, ratio {ratio_low:.6}");
        assert!(ratio_high < 0.01, "8 Hz should be rejected, ratio {ratio_high:.6}");
    }

    #[test]
    fn test_zero_phase_keeps_peak_position() {
        let sr = 10.0;
        let mut pulse = vec![0.0; 2001];
        pulse[1000] = 1.0;
        let filter = ZeroPhaseFilter::lowpass(1.0, sr).unwrap();
        let out = filter.apply_copy(&pulse);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 1000, "zero-phase filtering must not shift the pulse");
        for k in 1..50 {
            assert!((out[1000 - k] - out[1000 + k]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_freqmax_above_nyquist_falls_back_to_highpass() {
        let filter = ZeroPhaseFilter::bandpass(0.1, 0.6, 1.0).unwrap();
        assert_eq!(filter.sections.len(), 2);
    }

    #[test]
    fn test_invalid_corners() {
        assert!(ZeroPhaseFilter::bandpass(0.0, 1.0, 10.0).is_err());
        assert!(ZeroPhaseFilter::bandpass(2.0, 1.0, 10.0).is_err());
        assert!(ZeroPhaseFilter::bandpass(6.0, 8.0, 10.0).is_err());
        assert!(ZeroPhaseFilter::lowpass(5.0, 10.0).is_err());
        assert!(ZeroPhaseFilter::lowpass(1.0, 0.0).is_err());
    }
}
