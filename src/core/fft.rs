//! FFT sizing, frequency-axis helpers and constants shared across the crate.

use rustfft::num_complex::Complex;

/// Zero-valued complex number, used for spectrum initialization.
pub const COMPLEX_ZERO: Complex<f64> = Complex::new(0.0, 0.0);

/// Returns the smallest length `>= target` whose only prime factors are
/// 2, 3 and 5.
///
/// These sizes keep the mixed-radix transforms fast without padding all the
/// way to the next power of two.
pub fn next_fast_len(target: usize) -> usize {
    if target <= 6 {
        return target.max(1);
    }
    let mut n = target;
    loop {
        if is_five_smooth(n) {
            return n;
        }
        n += 1;
    }
}

#[inline]
fn is_five_smooth(mut n: usize) -> bool {
    for p in [2, 3, 5] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// Frequency (Hz) of each non-negative bin `[0, nfft/2)` for sample interval `delta`.
pub fn positive_frequencies(nfft: usize, delta: f64) -> Vec<f64> {
    let df = 1.0 / (nfft as f64 * delta);
    (0..nfft / 2).map(|k| k as f64 * df).collect()
}

/// Signed frequency (Hz) of bin `k` in a length-`nfft` transform.
#[inline]
pub fn bin_frequency(k: usize, nfft: usize, delta: f64) -> f64 {
    let df = 1.0 / (nfft as f64 * delta);
    let half = (nfft - 1) / 2;
    if k <= half {
        k as f64 * df
    } else {
        (k as f64 - nfft as f64) * df
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}
