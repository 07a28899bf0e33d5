//! Sample-rate conversion via linear, cubic, and windowed-sinc interpolation.
//!
//! Every routine evaluates the input at explicit fractional positions
//! `offset + i * step` (in input samples), so the output stays on an
//! absolute time grid.

/// Default number of sinc lobes for high-quality resampling.
pub const DEFAULT_SINC_LOBES: usize = 8;

/// Linear interpolation at positions `offset + i * step`.
///
/// Positions outside the input are clamped to the nearest end sample.
pub fn resample_linear(input: &[f64], offset: f64, step: f64, output_len: usize) -> Vec<f64> {
    if input.is_empty() || output_len == 0 {
        return vec![];
    }
    let last = input.len() - 1;
    (0..output_len)
        .map(|i| {
            let pos = (offset + i as f64 * step).clamp(0.0, last as f64);
            let idx = pos as usize;
            let frac = pos - idx as f64;
            if idx < last {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else {
                input[last]
            }
        })
        .collect()
}

/// Cubic (4-point Hermite) interpolation at positions `offset + i * step`.
pub fn resample_cubic(input: &[f64], offset: f64, step: f64, output_len: usize) -> Vec<f64> {
    if input.is_empty() || output_len == 0 {
        return vec![];
    }
    if input.len() < 4 {
        return resample_linear(input, offset, step, output_len);
    }
    let last = input.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = (offset + i as f64 * step).clamp(0.0, last as f64);
            let idx = pos as usize;
            let frac = pos - idx as f64;

            // Get 4 surrounding samples with boundary clamping
            let s0 = input[idx.saturating_sub(1)];
            let s1 = input[idx];
            let s2 = input[(idx + 1).min(last)];
            let s3 = input[(idx + 2).min(last)];

            let c0 = s1;
            let c1 = 0.5 * (s2 - s0);
            let c2 = s0 - 2.5 * s1 + 2.0 * s2 - 0.5 * s3;
            let c3 = 0.5 * (s3 - s0) + 1.5 * (s1 - s2);

            ((c3 * frac + c2) * frac + c1) * frac + c0
        })
        .collect()
}

/// Windowed-sinc interpolation at positions `offset + i * step`.
///
/// Uses a sinc kernel windowed with a Kaiser-Bessel window. `lobes` controls
/// the quality: more lobes = sharper cutoff but slower. The kernel does not
/// band-limit, so callers that decimate must low-pass first.
///
/// Falls back to cubic interpolation for very short inputs (< 2 * lobes).
pub fn resample_sinc(
    input: &[f64],
    offset: f64,
    step: f64,
    output_len: usize,
    lobes: usize,
) -> Vec<f64> {
    if input.is_empty() || output_len == 0 {
        return vec![];
    }
    let lobes = lobes.max(1);
    if input.len() < 2 * lobes {
        return resample_cubic(input, offset, step, output_len);
    }

    // Beta = 6.0 gives ~60 dB stopband attenuation.
    let beta = 6.0f64;
    let bessel_beta = bessel_i0(beta);

    (0..output_len)
        .map(|i| {
            let pos = offset + i as f64 * step;
            let center = pos.floor() as isize;
            let frac = pos - center as f64;

            let mut sample = 0.0f64;
            let mut weight_sum = 0.0f64;

            for j in (-(lobes as isize) + 1)..(lobes as isize + 1) {
                let idx = center + j;
                if idx < 0 || idx >= input.len() as isize {
                    continue;
                }

                let x = frac - j as f64;
                let sinc_val = if x.abs() < 1e-10 {
                    1.0
                } else {
                    let pi_x = std::f64::consts::PI * x;
                    pi_x.sin() / pi_x
                };

                let t = (j as f64 - frac) / lobes as f64;
                let window = if t.abs() <= 1.0 {
                    bessel_i0(beta * (1.0 - t * t).max(0.0).sqrt()) / bessel_beta
                } else {
                    0.0
                };

                let w = sinc_val * window;
                sample += input[idx as usize] * w;
                weight_sum += w;
            }

            // Normalize to preserve DC gain
            if weight_sum.abs() > 1e-10 {
                sample /= weight_sum;
            }
            sample
        })
        .collect()
}

/// Modified Bessel function of the first kind, order zero.
/// Approximated using the power series expansion.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0f64;
    let mut term = 1.0f64;
    let half_x = x * 0.5;

    for k in 1..=25 {
        term *= (half_x / k as f64) * (half_x / k as f64);
        sum += term;
        if term < sum * 1e-16 {
            break;
        }
    }

    sum
}
