//! Repairs one station's raw recording before windowing.
//!
//! The conditioner validates the fragment count and sampling rates, drops
//! dead traces, downsamples, closes short gaps by interpolation, merges
//! everything into one zero-filled trace and finally moves the samples onto
//! round time ticks.

use log::{debug, warn};
use rustfft::num_complex::Complex;

use crate::core::fft::{bin_frequency, next_fast_len};
use crate::core::filter::ZeroPhaseFilter;
use crate::core::resample::{resample_cubic, resample_sinc, DEFAULT_SINC_LOBES};
use crate::core::signal::{Frame, SignalBatch};
use crate::core::time::{add_seconds, seconds_between, subsecond};
use crate::core::types::{Stream, Trace};
use crate::core::window::Taper;
use crate::error::NoiseError;

/// More fragments than this marks a corrupted capture.
pub const MAX_TRACES: usize = 100;
/// Gaps of at most this many missing samples are interpolated.
pub const MAX_GAP_SAMPLES: usize = 10;
/// Traces shorter than this after downsampling are discarded.
pub const MIN_TRACE_SAMPLES: usize = 100;
/// Anti-alias corner as a fraction of the target sampling rate.
const ANTI_ALIAS_FRACTION: f64 = 0.4;
/// Flank length of the taper applied before a sub-sample shift, in seconds.
const PHASE_SHIFT_TAPER_SECS: f64 = 20.0;

/// A hole between two consecutive traces of a sorted stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Index of the trace before the gap.
    pub before: usize,
    /// Index of the trace after the gap.
    pub after: usize,
    /// Number of samples missing between the two.
    pub missing: usize,
}

/// Where the gap-repair loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapState {
    /// At least one gap is short enough to interpolate; this is the first.
    Fixable(Gap),
    /// Gaps remain but all of them are too long.
    Oversized(usize),
    /// The stream is contiguous.
    Clean,
}

/// Conditions a raw stream to a single trace at `target_rate`.
///
/// # Errors
///
/// * [`NoiseError::TooManyTraces`] if the stream has more than [`MAX_TRACES`] traces.
/// * [`NoiseError::EmptyStream`] if filtering leaves nothing.
/// * [`NoiseError::InvalidParameter`] if `target_rate` is not positive.
pub fn process_raw(stream: Stream, target_rate: f64) -> Result<Stream, NoiseError> {
    if stream.len() > MAX_TRACES {
        return Err(NoiseError::TooManyTraces {
            count: stream.len(),
            max: MAX_TRACES,
        });
    }
    if !(target_rate.is_finite() && target_rate > 0.0) {
        return Err(NoiseError::InvalidParameter(format!(
            "target sampling rate must be positive, got {}",
            target_rate
        )));
    }
    if stream.is_empty() {
        return Err(NoiseError::EmptyStream("reading input".into()));
    }

    let traces = check_sample(stream.traces);

    let traces: Vec<Trace> = traces
        .into_iter()
        .filter(|t| {
            let alive = t.max_abs() != 0.0;
            if !alive {
                debug!("{}: dropping all-zero trace", t.header.id());
            }
            alive
        })
        .collect();
    if traces.is_empty() {
        return Err(NoiseError::EmptyStream("removing all-zero traces".into()));
    }

    let traces = traces
        .iter()
        .map(|t| downsample(t, target_rate))
        .collect::<Result<Vec<_>, _>>()?;
    let mut traces = remove_small_traces(traces);
    if traces.is_empty() {
        return Err(NoiseError::EmptyStream("removing short traces".into()));
    }

    traces.sort_by_key(|t| t.starttime());
    let traces = repair_gaps(traces);
    let merged = merge(&traces)?;
    let conditioned = check_and_phase_shift(merged)?;
    debug!(
        "{}: conditioned to {} samples at {} Hz",
        conditioned.header.id(),
        conditioned.len(),
        conditioned.header.sampling_rate
    );
    Ok(Stream::new(vec![conditioned]))
}

/// Keeps only the traces sharing the most common sampling rate.
pub fn check_sample(traces: Vec<Trace>) -> Vec<Trace> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for t in &traces {
        let rate = t.header.sampling_rate;
        match counts.iter_mut().find(|(r, _)| same_rate(*r, rate)) {
            Some((_, n)) => *n += 1,
            None => counts.push((rate, 1)),
        }
    }
    let Some(&(common, _)) = counts
        .iter()
        .reduce(|best, c| if c.1 > best.1 { c } else { best })
    else {
        return traces;
    };
    if counts.len() > 1 {
        warn!(
            "mixed sampling rates {:?}, keeping traces at {} Hz",
            counts, common
        );
    }
    traces
        .into_iter()
        .filter(|t| same_rate(t.header.sampling_rate, common))
        .collect()
}

#[inline]
fn same_rate(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

/// Brings a trace to `target_rate`, keeping its start time.
///
/// Higher rates are low-passed at `0.4 * target_rate` and then decimated
/// (integer ratios) or sinc-interpolated onto the new grid. Lower rates are
/// interpolated up with a cubic kernel.
pub fn downsample(trace: &Trace, target_rate: f64) -> Result<Trace, NoiseError> {
    let rate = trace.header.sampling_rate;
    if same_rate(rate, target_rate) || trace.is_empty() {
        return Ok(trace.clone());
    }
    let ratio = rate / target_rate;
    let output_len = ((trace.len() - 1) as f64 / ratio + 1e-9).floor() as usize + 1;

    let data = if ratio > 1.0 {
        let anti_alias = ZeroPhaseFilter::lowpass(ANTI_ALIAS_FRACTION * target_rate, rate)?;
        let filtered = anti_alias.apply_copy(&trace.data);
        let factor = ratio.round();
        if (ratio - factor).abs() < 1e-6 {
            filtered.into_iter().step_by(factor as usize).collect()
        } else {
            resample_sinc(&filtered, 0.0, ratio, output_len, DEFAULT_SINC_LOBES)
        }
    } else {
        resample_cubic(&trace.data, 0.0, ratio, output_len)
    };
    Ok(trace.with_rate(data, target_rate))
}

/// Drops traces shorter than [`MIN_TRACE_SAMPLES`].
pub fn remove_small_traces(traces: Vec<Trace>) -> Vec<Trace> {
    traces
        .into_iter()
        .filter(|t| {
            let keep = t.len() >= MIN_TRACE_SAMPLES;
            if !keep {
                debug!("{}: dropping {}-sample trace", t.header.id(), t.len());
            }
            keep
        })
        .collect()
}

/// Gaps between consecutive traces of a start-sorted slice.
pub fn get_gaps(traces: &[Trace]) -> Vec<Gap> {
    traces
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let delta = pair[0].delta();
            let spacing = seconds_between(pair[0].endtime(), pair[1].starttime()) / delta;
            let missing = spacing.round() as i64 - 1;
            (missing >= 1).then_some(Gap {
                before: i,
                after: i + 1,
                missing: missing as usize,
            })
        })
        .collect()
}

fn gap_state(traces: &[Trace]) -> GapState {
    let gaps = get_gaps(traces);
    if gaps.is_empty() {
        return GapState::Clean;
    }
    match gaps.iter().find(|g| g.missing <= MAX_GAP_SAMPLES) {
        Some(&gap) => GapState::Fixable(gap),
        None => GapState::Oversized(gaps.len()),
    }
}

/// Closes every gap of at most [`MAX_GAP_SAMPLES`] by linear interpolation.
///
/// Longer gaps are left for [`merge`] to zero-fill.
pub fn repair_gaps(mut traces: Vec<Trace>) -> Vec<Trace> {
    loop {
        match gap_state(&traces) {
            GapState::Fixable(gap) => {
                let trailing = traces.remove(gap.after);
                let joined = join_interpolated(&traces[gap.before], &trailing, gap.missing);
                debug!(
                    "{}: interpolated {}-sample gap",
                    joined.header.id(),
                    gap.missing
                );
                traces[gap.before] = joined;
            }
            GapState::Oversized(count) => {
                debug!(
                    "{} gap(s) longer than {} samples left for zero fill",
                    count, MAX_GAP_SAMPLES
                );
                return traces;
            }
            GapState::Clean => return traces,
        }
    }
}

fn join_interpolated(head: &Trace, tail: &Trace, missing: usize) -> Trace {
    let a = head.data.last().copied().unwrap_or(0.0);
    let b = tail.data.first().copied().unwrap_or(0.0);
    let mut data = Vec::with_capacity(head.len() + missing + tail.len());
    data.extend_from_slice(&head.data);
    data.extend((1..=missing).map(|j| a + (b - a) * j as f64 / (missing + 1) as f64));
    data.extend_from_slice(&tail.data);
    head.with_samples(data, head.starttime())
}

/// Merges traces onto one sample grid, zero-filling gaps.
///
/// Where traces overlap the later one wins.
///
/// # Errors
///
/// Returns [`NoiseError::EmptyStream`] for an empty slice.
pub fn merge(traces: &[Trace]) -> Result<Trace, NoiseError> {
    let first = traces
        .first()
        .ok_or_else(|| NoiseError::EmptyStream("merging".into()))?;
    let delta = first.delta();
    let t0 = traces.iter().map(|t| t.starttime()).min().unwrap_or(first.starttime());
    let t_end = traces.iter().map(|t| t.endtime()).max().unwrap_or(first.endtime());

    let npts = (seconds_between(t0, t_end) / delta).round() as usize + 1;
    let mut data = vec![0.0; npts];
    for trace in traces {
        let offset = (seconds_between(t0, trace.starttime()) / delta).round() as usize;
        if offset >= npts {
            continue;
        }
        let n = trace.len().min(npts - offset);
        data[offset..offset + n].copy_from_slice(&trace.data[..n]);
    }
    Ok(first.with_samples(data, t0))
}

/// Moves samples onto exact multiples of `delta` past the whole second.
///
/// Sub-sample offsets are removed with a frequency-domain phase ramp after a
/// short edge taper; the start time moves to the nearer tick.
pub fn check_and_phase_shift(trace: Trace) -> Result<Trace, NoiseError> {
    let delta = trace.delta();
    let mut offset = subsecond(trace.starttime()) % delta;
    if offset < 1e-9 || delta - offset < 1e-9 {
        offset = 0.0;
    }
    if offset == 0.0 || trace.is_empty() {
        return Ok(trace);
    }
    let shift = if offset <= delta / 2.0 {
        -offset
    } else {
        delta - offset
    };

    let npts = trace.len();
    let nfft = next_fast_len(npts);
    let taper = Taper::Cosine {
        max_percentage: 0.5,
        max_samples: (PHASE_SHIFT_TAPER_SECS / delta) as usize,
    };
    let spectrum = Frame::new(trace.data.clone()).taper(taper).spectrum(nfft);
    let shifted = spectrum.map_rows(|row| {
        row.iter()
            .enumerate()
            .map(|(k, &c)| {
                let phase = 2.0 * std::f64::consts::PI * bin_frequency(k, nfft, delta) * shift;
                c * Complex::from_polar(1.0, phase)
            })
            .collect()
    });
    let data = shifted.inverse_real(nfft).row(0)[..npts].to_vec();
    Ok(trace.with_samples(data, add_seconds(trace.starttime(), shift)))
}

/// Renames `..X` channels to `..E` and `..Y` channels to `..N`.
pub fn xyz_to_zne(stream: Stream) -> Stream {
    stream
        .into_iter()
        .map(|mut t| {
            let channel = &mut t.header.channel;
            if let Some(prefix) = channel.strip_suffix('X') {
                *channel = format!("{}E", prefix);
            } else if let Some(prefix) = channel.strip_suffix('Y') {
                *channel = format!("{}N", prefix);
            }
            t
        })
        .collect()
}
