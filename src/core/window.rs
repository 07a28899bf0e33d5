//! Edge tapers for windowed seismic frames.
//!
//! Provides the half-cosine edge taper used before filtering a frame and the
//! Tukey window used to clean up correlation functions.

use std::f64::consts::PI;

/// Taper shapes applied to the edges of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Taper {
    /// Hann-shaped ramps on both flanks, each at most `max_percentage` of the
    /// frame and at most `max_samples` long. The middle is left untouched.
    Cosine {
        max_percentage: f64,
        max_samples: usize,
    },
    /// Tukey (tapered cosine) window; `alpha` is the tapered fraction of the
    /// whole window (0 = rectangular, 1 = Hann).
    Tukey(f64),
}

impl Taper {
    /// Generates the taper for a frame of `size` samples.
    pub fn window(&self, size: usize) -> Vec<f64> {
        if let Some(w) = trivial_window(size) {
            return w;
        }
        match *self {
            Taper::Cosine {
                max_percentage,
                max_samples,
            } => cosine_taper(size, max_percentage, max_samples),
            Taper::Tukey(alpha) => tukey_window(size, alpha),
        }
    }
}

/// Returns `Some(trivial_window)` for degenerate sizes (0 or 1), or `None`
/// to indicate the caller should compute the full window.
#[inline]
fn trivial_window(size: usize) -> Option<Vec<f64>> {
    match size {
        0 => Some(vec![]),
        1 => Some(vec![1.0]),
        _ => None,
    }
}

/// Half-Hann ramps of `min(max_percentage * size, max_samples)` samples per flank.
fn cosine_taper(size: usize, max_percentage: f64, max_samples: usize) -> Vec<f64> {
    let by_percentage = (max_percentage.clamp(0.0, 0.5) * size as f64) as usize;
    let ramp = by_percentage.min(max_samples).min(size / 2);
    let mut w = vec![1.0; size];
    if ramp == 0 {
        return w;
    }
    for i in 0..ramp {
        let v = 0.5 * (1.0 - (PI * i as f64 / ramp as f64).cos());
        w[i] = v;
        w[size - 1 - i] = v;
    }
    w
}

/// Tukey window with the same edge convention as the common scientific
/// stacks: the cosine lobes span `floor(alpha * (size - 1) / 2)` samples.
fn tukey_window(size: usize, alpha: f64) -> Vec<f64> {
    if alpha <= 0.0 {
        return vec![1.0; size];
    }
    let alpha = alpha.min(1.0);
    let m = (size - 1) as f64;
    let width = (alpha * m / 2.0).floor() as usize;
    let mut w = vec![1.0; size];
    for n in 0..=width.min(size - 1) {
        let v = 0.5 * (1.0 + (PI * (-1.0 + 2.0 * n as f64 / (alpha * m))).cos());
        w[n] = v;
        w[size - 1 - n] = v;
    }
    w
}

/// Applies a window to a slice in-place.
#[inline]
pub fn apply_window(data: &mut [f64], window: &[f64]) {
    for (sample, &w) in data.iter_mut().zip(window.iter()) {
        *sample *= w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_taper_flanks() {
        let w = Taper::Cosine {
            max_percentage: 0.05,
            max_samples: 1000,
        }
        .window(1000);
        assert_eq!(w.len(), 1000);
        // 5% of 1000 = 50 samples per flank
        assert!(w[0].abs() < 1e-12);
        assert!(w[999].abs() < 1e-12);
        assert!(w[25] > 0.0 && w[25] < 1.0);
        for &v in &w[50..950] {
            assert_eq!(v, 1.0);
        }
    }

    #[test]
    fn test_cosine_taper_capped_by_length() {
        let w = Taper::Cosine {
            max_percentage: 0.05,
            max_samples: 10,
        }
        .window(1000);
        assert!(w[5] < 1.0);
        assert_eq!(w[10], 1.0);
        assert_eq!(w[989], 1.0);
        assert!(w[994] < 1.0);
    }

    #[test]
    fn test_tukey_properties() {
        let w = Taper::Tukey(0.5).window(101);
        assert!(w[0].abs() < 1e-12);
        assert!(w[100].abs() < 1e-12);
        assert!((w[50] - 1.0).abs() < 1e-12);
        for i in 0..50 {
            assert!((w[i] - w[100 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tukey_rectangular_and_hann_limits() {
        assert!(Taper::Tukey(0.0).window(16).iter().all(|&v| v == 1.0));
        let hann = Taper::Tukey(1.0).window(9);
        assert!(hann[0].abs() < 1e-12);
        assert!((hann[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(Taper::Tukey(0.5).window(0).is_empty());
        assert_eq!(Taper::Tukey(0.5).window(1), vec![1.0]);
    }

    #[test]
    fn test_apply_window() {
        let window = vec![0.5, 1.0, 0.5];
        let mut data = vec![2.0, 3.0, 4.0];
        apply_window(&mut data, &window);
        assert_eq!(data, vec![1.0, 3.0, 2.0]);
    }
}
