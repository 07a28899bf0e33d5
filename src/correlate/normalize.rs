//! Per-window filtering, quality metrics and time-domain normalization.

use log::debug;

use crate::config::{CorrelationParams, TimeNorm};
use crate::core::filter::ZeroPhaseFilter;
use crate::core::signal::{Detrend, FrameMatrix, SignalBatch};
use crate::core::time::{seconds_between, Timestamp};
use crate::core::types::QualityMetrics;
use crate::core::window::Taper;
use crate::error::NoiseError;
use crate::stream::windower::WindowedTrace;

/// Fraction of each frame tapered per flank before filtering.
const TAPER_FRACTION: f64 = 0.05;
/// Upper bound on the taper flank, in seconds.
const TAPER_MAX_SECS: f64 = 20.0;

/// Filtered, normalized frames ready for the spectral stage.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrames {
    pub matrix: FrameMatrix,
    /// One entry per row of `matrix`, measured before time normalization.
    pub metrics: Vec<QualityMetrics>,
    /// Sample interval, in seconds.
    pub delta: f64,
}

/// Detrends, tapers and bandpasses every frame, measures it, then applies
/// the configured time normalization.
///
/// # Errors
///
/// Returns [`NoiseError::InvalidParameter`] if the passband does not fit the
/// sampling rate.
pub fn process_cc(
    windows: &WindowedTrace,
    params: &CorrelationParams,
) -> Result<NormalizedFrames, NoiseError> {
    let rate = windows.header.sampling_rate;
    let delta = windows.delta();
    let bandpass = ZeroPhaseFilter::bandpass(params.freqmin, params.freqmax, rate)?;
    let taper = Taper::Cosine {
        max_percentage: TAPER_FRACTION,
        max_samples: (TAPER_MAX_SECS * rate) as usize,
    };

    let filtered = windows
        .frames
        .clone()
        .detrend(Detrend::Constant)
        .detrend(Detrend::Linear)
        .taper(taper)
        .filter(&bandpass)
        .detrend(Detrend::Constant);

    let metrics = quality_metrics(&filtered, &windows.starts, delta);

    let matrix = match params.time_norm {
        TimeNorm::None => filtered,
        TimeNorm::OneBit => filtered.map_samples(one_bit),
        TimeNorm::RunningMean => {
            let n = running_mean_width(params.freqmin);
            filtered.map_rows(|row| running_mean_normalize(row, n))
        }
    };
    debug!(
        "{}: normalized {} frame(s) with {}",
        windows.header.id(),
        matrix.rows(),
        params.time_norm
    );

    Ok(NormalizedFrames {
        matrix,
        metrics,
        delta,
    })
}

/// Sign of `x`, with zero mapped to zero.
#[inline]
pub fn one_bit(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Running-mean width in samples for a lower corner `freqmin`.
#[inline]
pub fn running_mean_width(freqmin: f64) -> usize {
    ((1.0 / (2.0 * freqmin)) as usize).max(1)
}

/// Centered running mean of `|x|` over `width` samples.
///
/// Near the edges the mean is taken over the samples that exist.
pub fn running_abs_mean(data: &[f64], width: usize) -> Vec<f64> {
    let n = data.len();
    let width = width.max(1);
    let before = (width - 1) / 2;
    let after = width - 1 - before;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &v in data {
        let last = prefix.last().copied().unwrap_or(0.0);
        prefix.push(last + v.abs());
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after + 1).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

fn running_mean_normalize(row: &[f64], width: usize) -> Vec<f64> {
    running_abs_mean(row, width)
        .into_iter()
        .zip(row)
        .map(|(mean, &x)| if mean == 0.0 { 0.0 } else { x / mean })
        .collect()
}

/// Median of `data` (mean of the two middle values for even lengths).
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation, `median(|x - median(x)|)`.
pub fn mad(data: &[f64]) -> f64 {
    let m = median(data);
    let deviations: Vec<f64> = data.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Overlays frames at their time offsets; later frames overwrite overlap.
fn overlay(frames: &FrameMatrix, starts: &[Timestamp], delta: f64) -> Vec<f64> {
    let Some(&first) = starts.first() else {
        return Vec::new();
    };
    let offsets: Vec<usize> = starts
        .iter()
        .map(|&s| (seconds_between(first, s) / delta).round().max(0.0) as usize)
        .collect();
    let total = offsets
        .iter()
        .zip(frames.row_lengths())
        .map(|(o, l)| o + l)
        .max()
        .unwrap_or(0);
    let mut merged = vec![0.0; total];
    for (i, &offset) in offsets.iter().enumerate() {
        let row = frames.valid_row(i);
        merged[offset..offset + row.len()].copy_from_slice(row);
    }
    merged
}

#[inline]
fn ratio(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        if value == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        value / baseline
    }
}

/// Peak-to-MAD, peak-to-std and non-zero fraction of every frame.
///
/// The MAD and std baselines come from all frames overlaid into one series.
pub fn quality_metrics(
    frames: &FrameMatrix,
    starts: &[Timestamp],
    delta: f64,
) -> Vec<QualityMetrics> {
    let merged = overlay(frames, starts, delta);
    let mad_base = mad(&merged);
    let std_base = std_dev(&merged);

    (0..frames.rows())
        .map(|i| {
            let row = frames.valid_row(i);
            let peak = row.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            let nonzero = row.iter().filter(|&&v| v != 0.0).count();
            QualityMetrics {
                mad_ratio: ratio(peak, mad_base),
                std_ratio: ratio(peak, std_base),
                nonzero_fraction: if row.is_empty() {
                    0.0
                } else {
                    nonzero as f64 / row.len() as f64
                },
            }
        })
        .collect()
}
