//! Run parameters for one station-pair correlation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::fft::next_fast_len;
use crate::correlate::engine::max_lag_for;
use crate::error::NoiseError;

/// Default spacing between successive correlation windows, in seconds.
pub const DEFAULT_STEP: f64 = 1800.0;
/// Default correlation window length, in seconds.
pub const DEFAULT_CC_LEN: f64 = 3600.0;

/// How the two spectra are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// `F1 * conj(F2)`.
    #[default]
    CrossCorrelation,
    /// Cross spectrum divided by the smoothed power of the second spectrum.
    Deconv,
    /// Cross spectrum divided by both smoothed amplitude spectra.
    Coherence,
}

/// Time-domain amplitude normalization applied before whitening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeNorm {
    None,
    /// Replace each sample with its sign.
    OneBit,
    /// Divide by a running mean of the absolute amplitude.
    #[default]
    RunningMean,
}

impl FromStr for Method {
    type Err = NoiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cross_correlation" => Ok(Method::CrossCorrelation),
            "deconv" => Ok(Method::Deconv),
            "coherence" => Ok(Method::Coherence),
            other => Err(NoiseError::InvalidParameter(format!(
                "unknown method '{}', expected cross_correlation, deconv or coherence",
                other
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::CrossCorrelation => "cross_correlation",
            Method::Deconv => "deconv",
            Method::Coherence => "coherence",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeNorm {
    type Err = NoiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TimeNorm::None),
            "one_bit" => Ok(TimeNorm::OneBit),
            "running_mean" => Ok(TimeNorm::RunningMean),
            other => Err(NoiseError::InvalidParameter(format!(
                "unknown time normalization '{}', expected none, one_bit or running_mean",
                other
            ))),
        }
    }
}

impl fmt::Display for TimeNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeNorm::None => "none",
            TimeNorm::OneBit => "one_bit",
            TimeNorm::RunningMean => "running_mean",
        };
        f.write_str(name)
    }
}

/// Parameters controlling one correlation run.
///
/// This is the single source of truth for a run: every stage reads its
/// settings from here rather than carrying its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationParams {
    /// Maximum lag kept in the correlation functions, in seconds.
    pub maxlag: f64,
    /// Sampling rate both streams are brought to, in Hz.
    pub downsamp_freq: f64,
    /// Lower corner of the passband, in Hz.
    pub freqmin: f64,
    /// Upper corner of the passband, in Hz.
    pub freqmax: f64,
    /// Window advance, in seconds (default: 1800).
    pub step: f64,
    /// Window length, in seconds (default: 3600).
    pub cc_len: f64,
    pub method: Method,
    pub time_norm: TimeNorm,
    /// Directory holding `NET.STA.xml` response files, if any.
    pub response_dir: Option<PathBuf>,
    /// Whether to flatten the spectral amplitude inside the band (default: true).
    pub whiten: bool,
    /// Whether to detrend/taper/bandpass the final correlations (default: false).
    pub post_filter: bool,
}

impl CorrelationParams {
    /// Create parameters with the required physical settings and defaults
    /// for everything else.
    pub fn new(maxlag: f64, downsamp_freq: f64, freqmin: f64, freqmax: f64) -> Self {
        Self {
            maxlag,
            downsamp_freq,
            freqmin,
            freqmax,
            step: DEFAULT_STEP,
            cc_len: DEFAULT_CC_LEN,
            method: Method::default(),
            time_norm: TimeNorm::default(),
            response_dir: None,
            whiten: true,
            post_filter: false,
        }
    }

    /// Set the window advance and length, in seconds.
    pub fn with_windows(mut self, step: f64, cc_len: f64) -> Self {
        self.step = step;
        self.cc_len = cc_len;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_time_norm(mut self, time_norm: TimeNorm) -> Self {
        self.time_norm = time_norm;
        self
    }

    pub fn with_response_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.response_dir = Some(dir.into());
        self
    }

    pub fn with_whitening(mut self, whiten: bool) -> Self {
        self.whiten = whiten;
        self
    }

    pub fn with_post_filter(mut self, post_filter: bool) -> Self {
        self.post_filter = post_filter;
        self
    }

    /// Maximum lag in samples at the target rate.
    pub fn maxlag_samples(&self) -> f64 {
        self.maxlag * self.downsamp_freq
    }

    /// Samples in one correlation window at the target rate, both ends included.
    pub fn window_samples(&self) -> usize {
        (self.cc_len * self.downsamp_freq).round() as usize + 1
    }

    /// Checks ranges and mutual consistency of the parameters.
    ///
    /// # Errors
    /// Returns [`NoiseError::InvalidParameter`] naming the first offending value.
    pub fn validate(&self) -> Result<(), NoiseError> {
        let positive = [
            ("downsamp_freq", self.downsamp_freq),
            ("freqmin", self.freqmin),
            ("freqmax", self.freqmax),
            ("step", self.step),
            ("cc_len", self.cc_len),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(NoiseError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.maxlag.is_finite() && self.maxlag >= 0.0) {
            return Err(NoiseError::InvalidParameter(format!(
                "maxlag must be non-negative, got {}",
                self.maxlag
            )));
        }
        if self.freqmin >= self.freqmax {
            return Err(NoiseError::InvalidParameter(format!(
                "freqmin {} must be below freqmax {}",
                self.freqmin, self.freqmax
            )));
        }
        if self.freqmin >= 0.5 * self.downsamp_freq {
            return Err(NoiseError::InvalidParameter(format!(
                "freqmin {} must be below Nyquist {}",
                self.freqmin,
                0.5 * self.downsamp_freq
            )));
        }
        if self.maxlag > self.cc_len {
            return Err(NoiseError::InvalidParameter(format!(
                "maxlag {} exceeds window length {}",
                self.maxlag, self.cc_len
            )));
        }
        let lags = self.maxlag_samples().round() as usize;
        let available = max_lag_for(next_fast_len(self.window_samples()));
        if lags > available {
            return Err(NoiseError::InvalidParameter(format!(
                "maxlag of {} samples exceeds the {} a {} s window holds",
                lags, available, self.cc_len
            )));
        }
        Ok(())
    }
}
