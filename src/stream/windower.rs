//! Cuts conditioned traces into overlapping, time-aligned frames.

use log::debug;

use crate::core::signal::FrameMatrix;
use crate::core::time::{add_seconds, seconds_between, Timestamp};
use crate::core::types::{Trace, TraceHeader};
use crate::error::NoiseError;

/// Slack on sample-index rounding, in samples.
const INDEX_EPS: f64 = 1e-6;
/// Two frame starts closer than this are the same window, in seconds.
const START_TOLERANCE: f64 = 1e-6;

/// Frames cut from one trace, with the start time of every row.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedTrace {
    /// Header of the trace the frames were cut from.
    pub header: TraceHeader,
    pub frames: FrameMatrix,
    /// Time of the first sample of each row.
    pub starts: Vec<Timestamp>,
}

impl WindowedTrace {
    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.header.delta
    }

    /// Keeps only the rows listed in `keep`, in that order.
    fn select(&self, keep: &[usize]) -> Self {
        let rows: Vec<&[f64]> = keep.iter().map(|&i| self.frames.valid_row(i)).collect();
        Self {
            header: self.header.clone(),
            frames: FrameMatrix::from_rows(&rows),
            starts: keep.iter().map(|&i| self.starts[i]).collect(),
        }
    }
}

/// Cuts or zero-pads `trace` to exactly cover `[t1, t2]`.
///
/// The new start is the sample of the old grid nearest `t1`.
///
/// # Errors
///
/// Returns [`NoiseError::InvalidTimeRange`] if `t1 > t2`.
pub fn trim(trace: &Trace, t1: Timestamp, t2: Timestamp) -> Result<Trace, NoiseError> {
    if t1 > t2 {
        return Err(NoiseError::InvalidTimeRange {
            start: t1.to_rfc3339(),
            end: t2.to_rfc3339(),
        });
    }
    let delta = trace.delta();
    let npts = (seconds_between(t1, t2) / delta).round() as usize + 1;
    let offset = (seconds_between(trace.starttime(), t1) / delta).round() as i64;

    let data = (0..npts as i64)
        .map(|i| {
            let src = offset + i;
            if src >= 0 && (src as usize) < trace.len() {
                trace.data[src as usize]
            } else {
                0.0
            }
        })
        .collect();
    let start = add_seconds(trace.starttime(), offset as f64 * delta);
    Ok(trace.with_samples(data, start))
}

/// Start times `t1 + k*step` of every `cc_len` window that fits in `[t1, t2]`.
pub fn window_starts(t1: Timestamp, t2: Timestamp, cc_len: f64, step: f64) -> Vec<Timestamp> {
    if !(step > 0.0 && cc_len > 0.0) {
        return Vec::new();
    }
    let total = seconds_between(t1, t2);
    let mut starts = Vec::new();
    let mut k = 0usize;
    while k as f64 * step + cc_len <= total + START_TOLERANCE {
        starts.push(add_seconds(t1, k as f64 * step));
        k += 1;
    }
    starts
}

/// One frame per window of `trace`, each `round(cc_len * rate) + 1` samples.
///
/// A frame begins at the first sample at or after its window start and ends
/// at the last sample at or before the window end.
pub fn slide(trace: &Trace, cc_len: f64, step: f64) -> WindowedTrace {
    let delta = trace.delta();
    let mut rows: Vec<&[f64]> = Vec::new();
    let mut starts = Vec::new();

    for window in window_starts(trace.starttime(), trace.endtime(), cc_len, step) {
        let offset = seconds_between(trace.starttime(), window);
        let i0 = (offset / delta - INDEX_EPS).ceil().max(0.0) as usize;
        let i1 = ((offset + cc_len) / delta + INDEX_EPS).floor() as usize;
        if i0 >= trace.len() {
            break;
        }
        let i1 = i1.min(trace.len() - 1);
        rows.push(&trace.data[i0..=i1]);
        starts.push(add_seconds(trace.starttime(), i0 as f64 * delta));
    }
    debug!("{}: cut {} window(s)", trace.header.id(), starts.len());

    WindowedTrace {
        header: trace.header.clone(),
        frames: FrameMatrix::from_rows(&rows),
        starts,
    }
}

/// Drops every frame index whose start differs between the two sides.
///
/// Indices present on only one side are dropped too, so both results have
/// the same row count and pairwise identical start times.
///
/// # Errors
///
/// Returns [`NoiseError::EmptyStream`] if either side has no frames, or if
/// no pair survives.
pub fn match_frames(
    source: WindowedTrace,
    receiver: WindowedTrace,
) -> Result<(WindowedTrace, WindowedTrace), NoiseError> {
    if source.is_empty() || receiver.is_empty() {
        return Err(NoiseError::EmptyStream("windowing".into()));
    }
    let keep: Vec<usize> = source
        .starts
        .iter()
        .zip(&receiver.starts)
        .enumerate()
        .filter(|(_, (a, b))| seconds_between(**a, **b).abs() <= START_TOLERANCE)
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return Err(NoiseError::EmptyStream("matching windows".into()));
    }
    let dropped = source.len().max(receiver.len()) - keep.len();
    if dropped == 0 && source.len() == receiver.len() {
        return Ok((source, receiver));
    }
    debug!("dropping {} unmatched window(s)", dropped);
    Ok((source.select(&keep), receiver.select(&keep)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signal::SignalBatch;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2017, 1, 13, 0, 0, 0).unwrap()
    }

    fn trace(start_offset: f64, rate: f64, len: usize) -> Trace {
        let header = TraceHeader::new("XX", "STA", "BHZ", rate, add_seconds(t0(), start_offset));
        Trace::new(header, (0..len).map(|i| i as f64 + 1.0).collect()).unwrap()
    }

    #[test]
    fn test_trim_pads_and_cuts() {
        let tr = trace(0.0, 1.0, 100);
        let out = trim(&tr, add_seconds(t0(), -10.0), add_seconds(t0(), 109.0)).unwrap();
        assert_eq!(out.len(), 120);
        assert_eq!(out.starttime(), add_seconds(t0(), -10.0));
        assert!(out.data[..10].iter().all(|&v| v == 0.0));
        assert_eq!(out.data[10], 1.0);
        assert_eq!(out.data[109], 100.0);
        assert!(out.data[110..].iter().all(|&v| v == 0.0));

        let inner = trim(&tr, add_seconds(t0(), 20.0), add_seconds(t0(), 29.0)).unwrap();
        assert_eq!(inner.data, (21..=30).map(|v| v as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_trim_rejects_reversed_range() {
        let tr = trace(0.0, 1.0, 10);
        assert!(matches!(
            trim(&tr, add_seconds(t0(), 5.0), t0()),
            Err(NoiseError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn test_window_count() {
        let starts = window_starts(t0(), add_seconds(t0(), 7200.0), 3600.0, 1800.0);
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[2], add_seconds(t0(), 3600.0));

        let day = window_starts(t0(), add_seconds(t0(), 86400.0), 3600.0, 1800.0);
        assert_eq!(day.len(), ((86400.0 - 3600.0) / 1800.0) as usize + 1);

        assert!(window_starts(t0(), add_seconds(t0(), 1000.0), 3600.0, 1800.0).is_empty());
    }

    #[test]
    fn test_slide_frame_shape() {
        let tr = trace(0.0, 1.0, 7201);
        let w = slide(&tr, 3600.0, 1800.0);
        assert_eq!(w.len(), 3);
        assert_eq!(w.frames.rows(), 3);
        assert_eq!(w.frames.cols(), 3601);
        assert_eq!(w.frames.valid_row(1)[0], 1801.0);
        assert_eq!(w.starts[1], add_seconds(t0(), 1800.0));
    }

    #[test]
    fn test_match_frames_drops_mismatches() {
        let a = slide(&trace(0.0, 1.0, 7201), 3600.0, 1800.0);
        // receiver shifted by a full step: its first window lines up with a's second
        let b = slide(&trace(1800.0, 1.0, 5401), 3600.0, 1800.0);
        assert_eq!(b.len(), 2);
        let mut b_shifted = b.clone();
        b_shifted.starts = vec![a.starts[0], b.starts[1]];
        let (ma, mb) = match_frames(a.clone(), b_shifted).unwrap();
        assert_eq!(ma.len(), 1);
        assert_eq!(mb.len(), 1);
        assert_eq!(ma.starts, mb.starts);
        assert_eq!(ma.frames.rows(), mb.frames.rows());
    }

    #[test]
    fn test_match_frames_empty() {
        let a = slide(&trace(0.0, 1.0, 7201), 3600.0, 1800.0);
        let short = slide(&trace(0.0, 1.0, 100), 3600.0, 1800.0);
        assert!(short.is_empty());
        assert!(matches!(
            match_frames(a.clone(), short),
            Err(NoiseError::EmptyStream(_))
        ));

        let b = slide(&trace(900.0, 1.0, 7201), 3600.0, 1800.0);
        assert!(matches!(
            match_frames(a, b),
            Err(NoiseError::EmptyStream(_))
        ));
    }
}
