//! Waveform traces, streams and the per-window records derived from them.

use serde::{Deserialize, Serialize};

use crate::core::time::{add_seconds, seconds_between, Timestamp};
use crate::error::NoiseError;

/// Header of a uniformly sampled waveform trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// Sampling rate in Hz.
    pub sampling_rate: f64,
    /// Sample interval in seconds (`1 / sampling_rate`).
    pub delta: f64,
    /// Number of samples.
    pub npts: usize,
    /// Time of the first sample.
    pub starttime: Timestamp,
}

impl TraceHeader {
    /// Creates a header with an empty location code and zero samples.
    pub fn new(
        network: &str,
        station: &str,
        channel: &str,
        sampling_rate: f64,
        starttime: Timestamp,
    ) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: String::new(),
            channel: channel.to_string(),
            sampling_rate,
            delta: 1.0 / sampling_rate,
            npts: 0,
            starttime,
        }
    }

    /// Set the location code.
    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    /// Time of the last sample.
    pub fn endtime(&self) -> Timestamp {
        add_seconds(
            self.starttime,
            self.npts.saturating_sub(1) as f64 * self.delta,
        )
    }

    /// `NET.STA.LOC.CHA` identifier.
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// `NET.STA` key used for location tables and response files.
    pub fn netsta(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }
}

/// A uniformly sampled real-valued waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub header: TraceHeader,
    pub data: Vec<f64>,
}

impl Trace {
    /// Creates a trace, setting `npts` and `delta` from the data and rate.
    ///
    /// # Errors
    /// Returns `NoiseError::InvalidTrace` if the sampling rate is not a
    /// positive finite number.
    pub fn new(mut header: TraceHeader, data: Vec<f64>) -> Result<Self, NoiseError> {
        if !(header.sampling_rate.is_finite() && header.sampling_rate > 0.0) {
            return Err(NoiseError::InvalidTrace(format!(
                "{}: sampling rate must be positive, got {}",
                header.id(),
                header.sampling_rate
            )));
        }
        header.delta = 1.0 / header.sampling_rate;
        header.npts = data.len();
        Ok(Self { header, data })
    }

    /// Same station/channel, new samples starting at `starttime`.
    pub(crate) fn with_samples(&self, data: Vec<f64>, starttime: Timestamp) -> Self {
        let mut header = self.header.clone();
        header.npts = data.len();
        header.starttime = starttime;
        Self { header, data }
    }

    /// Same station/channel and start, new samples at a new rate.
    pub(crate) fn with_rate(&self, data: Vec<f64>, sampling_rate: f64) -> Self {
        let mut header = self.header.clone();
        header.sampling_rate = sampling_rate;
        header.delta = 1.0 / sampling_rate;
        header.npts = data.len();
        Self { header, data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn starttime(&self) -> Timestamp {
        self.header.starttime
    }

    #[inline]
    pub fn endtime(&self) -> Timestamp {
        self.header.endtime()
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.header.delta
    }

    /// Largest absolute sample value (0 for an empty trace).
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
    }

    /// Duration covered by the samples, in seconds.
    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.starttime(), self.endtime())
    }
}

/// An ordered collection of traces from one station/channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    pub traces: Vec<Trace>,
}

impl Stream {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// Sorts traces by start time.
    pub fn sort(&mut self) {
        self.traces.sort_by_key(|t| t.starttime());
    }
}

impl FromIterator<Trace> for Stream {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        Self {
            traces: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Stream {
    type Item = Trace;
    type IntoIter = std::vec::IntoIter<Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.into_iter()
    }
}

/// A correlation window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.start, self.end)
    }
}

/// Per-window amplitude and completeness measures.
///
/// Used downstream to flag earthquakes and gaps; never a filtering gate here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Peak absolute amplitude over the station-wide median absolute deviation.
    pub mad_ratio: f64,
    /// Peak absolute amplitude over the station-wide standard deviation.
    pub std_ratio: f64,
    /// Fraction of non-zero samples in the window.
    pub nonzero_fraction: f64,
}
