//! End-to-end correlation of one source/receiver pair.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::CorrelationParams;
use crate::core::signal::{FrameMatrix, SignalBatch};
use crate::core::time::{add_seconds, nearest_step, Timestamp};
use crate::core::types::{QualityMetrics, Stream, TimeWindow, Trace, TraceHeader};
use crate::correlate::{clean_up, correlate, process_cc, whiten};
use crate::error::NoiseError;
use crate::stream::{match_frames, process_raw, slide, trim};

/// Instrument-response lookup for the external response-removal step.
///
/// Prepared when a response directory is configured; never applied here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    /// `<dir>/<NET>.<STA>.xml`
    pub path: PathBuf,
    pub network: String,
    pub station: String,
    pub channel: String,
    pub starttime: Timestamp,
    pub endtime: Timestamp,
}

impl ResponseRequest {
    fn for_header(dir: &Path, header: &TraceHeader, t1: Timestamp, t2: Timestamp) -> Self {
        Self {
            path: dir.join(format!("{}.xml", header.netsta())),
            network: header.network.clone(),
            station: header.station.clone(),
            channel: header.channel.clone(),
            starttime: t1,
            endtime: t2,
        }
    }
}

/// Correlation functions of one pair plus everything needed to store them.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationOutput {
    /// One row per window, `2 * maxlag_samples + 1` lags, zero lag centered.
    pub corr: FrameMatrix,
    /// `(start, start + cc_len)` of every row.
    pub windows: Vec<TimeWindow>,
    /// Source trace header after conditioning and trimming.
    pub source: TraceHeader,
    pub receiver: TraceHeader,
    pub source_metrics: Vec<QualityMetrics>,
    pub receiver_metrics: Vec<QualityMetrics>,
    /// Empty unless a response directory was configured.
    pub response_requests: Vec<ResponseRequest>,
}

impl CorrelationOutput {
    /// Lag of every column, in seconds.
    pub fn lags(&self) -> Vec<f64> {
        let half = (self.corr.cols() / 2) as isize;
        (-half..=half)
            .map(|k| k as f64 * self.source.delta)
            .collect()
    }
}

/// Correlates `source` against `receiver` over their common, step-aligned span.
///
/// # Errors
///
/// Any [`NoiseError`] raised by a stage; no partial result is returned.
pub fn compute_cc(
    source: Stream,
    receiver: Stream,
    params: &CorrelationParams,
) -> Result<CorrelationOutput, NoiseError> {
    params.validate()?;

    let source = single_trace(process_raw(source, params.downsamp_freq)?)?;
    let receiver = single_trace(process_raw(receiver, params.downsamp_freq)?)?;

    let (source_start, receiver_start) =
        nearest_step(source.starttime(), receiver.starttime(), params.step)?;
    let (source_end, receiver_end) =
        nearest_step(source.endtime(), receiver.endtime(), params.step)?;
    let t1 = source_start.max(receiver_start);
    let t2 = source_end.min(receiver_end);
    if t1 > t2 {
        return Err(NoiseError::InvalidTimeRange {
            start: t1.to_rfc3339(),
            end: t2.to_rfc3339(),
        });
    }
    debug!(
        "{} x {}: common span {} to {}",
        source.header.id(),
        receiver.header.id(),
        t1,
        t2
    );

    let source = trim(&source, t1, t2)?;
    let receiver = trim(&receiver, t1, t2)?;

    let response_requests = match &params.response_dir {
        Some(dir) => vec![
            ResponseRequest::for_header(dir, &source.header, t1, t2),
            ResponseRequest::for_header(dir, &receiver.header, t1, t2),
        ],
        None => Vec::new(),
    };

    let (source_windows, receiver_windows) = match_frames(
        slide(&source, params.cc_len, params.step),
        slide(&receiver, params.cc_len, params.step),
    )?;

    let source_frames = process_cc(&source_windows, params)?;
    let receiver_frames = process_cc(&receiver_windows, params)?;

    let fft1 = whiten(
        &source_frames.matrix,
        source_frames.delta,
        params.freqmin,
        params.freqmax,
        params.whiten,
        None,
    )?;
    let fft2 = whiten(
        &receiver_frames.matrix,
        receiver_frames.delta,
        params.freqmin,
        params.freqmax,
        params.whiten,
        Some(fft1.nfft()),
    )?;

    let corr = correlate(&fft1, &fft2, params.maxlag_samples(), None, params.method)?;
    let corr = if params.post_filter {
        clean_up(corr, params.downsamp_freq, params.freqmin, params.freqmax)?
    } else {
        corr
    };

    let windows = source_windows
        .starts
        .iter()
        .map(|&start| TimeWindow::new(start, add_seconds(start, params.cc_len)))
        .collect();

    Ok(CorrelationOutput {
        corr,
        windows,
        source: source.header,
        receiver: receiver.header,
        source_metrics: source_frames.metrics,
        receiver_metrics: receiver_frames.metrics,
        response_requests,
    })
}

fn single_trace(stream: Stream) -> Result<Trace, NoiseError> {
    stream
        .into_iter()
        .next()
        .ok_or_else(|| NoiseError::EmptyStream("conditioning".into()))
}
