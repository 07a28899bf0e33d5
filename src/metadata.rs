//! Station geometry and the per-pair header stored beside correlations.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::time::epoch_seconds;
use crate::core::types::{QualityMetrics, TraceHeader};
use crate::error::NoiseError;
use crate::pipeline::CorrelationOutput;

/// Mean Earth radius, in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geographic position of a station, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl StationLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle separation of two stations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairGeometry {
    /// Distance in km.
    pub dist: f64,
    /// Azimuth from the first station to the second, degrees in `[0, 360)`.
    pub azi: f64,
    /// Azimuth from the second station back to the first.
    pub baz: f64,
}

/// A single value in a station header map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    Count(usize),
    Number(f64),
}

/// Role-prefixed station header fields, ordered by key.
pub type HeaderFields = BTreeMap<String, HeaderValue>;

/// Per-pair metadata stored alongside the correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationHeader {
    pub source_mad: Vec<f64>,
    pub source_std: Vec<f64>,
    pub source_nonzero: Vec<f64>,
    pub receiver_mad: Vec<f64>,
    pub receiver_std: Vec<f64>,
    pub receiver_nonzero: Vec<f64>,
    pub dist: f64,
    pub azi: f64,
    pub baz: f64,
    /// Maximum lag, in seconds.
    pub lag: f64,
    /// Window starts, epoch seconds.
    pub starttime: Vec<f64>,
    /// Window ends, epoch seconds.
    pub endtime: Vec<f64>,
    #[serde(flatten)]
    pub source: HeaderFields,
    #[serde(flatten)]
    pub receiver: HeaderFields,
}

/// Distance and azimuths between two points on a spherical Earth.
pub fn calc_distance(a: &StationLocation, b: &StationLocation) -> PairGeometry {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let dist = 2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin();

    PairGeometry {
        dist,
        azi: bearing(lat1, lon1, lat2, lon2),
        baz: bearing(lat2, lon2, lat1, lon1),
    }
}

/// Initial great-circle bearing, degrees clockwise from north in `[0, 360)`.
fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlon = lon2 - lon1;
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let deg = y.atan2(x).to_degrees().rem_euclid(360.0);
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

fn locate<'a>(
    locations: &'a HashMap<String, StationLocation>,
    key: &str,
) -> Result<&'a StationLocation, NoiseError> {
    locations
        .get(key)
        .ok_or_else(|| NoiseError::MissingLocation(key.to_string()))
}

/// Keeps the `(source, receiver)` pairs with `min_dist < dist < max_dist` km.
///
/// # Errors
///
/// Returns [`NoiseError::MissingLocation`] if a station is not in `locations`.
pub fn filter_dist(
    pairs: &[(String, String)],
    locations: &HashMap<String, StationLocation>,
    min_dist: f64,
    max_dist: f64,
) -> Result<Vec<(String, String)>, NoiseError> {
    let mut kept = Vec::new();
    for (source, receiver) in pairs {
        let geometry = calc_distance(locate(locations, source)?, locate(locations, receiver)?);
        if geometry.dist > min_dist && geometry.dist < max_dist {
            kept.push((source.clone(), receiver.clone()));
        }
    }
    Ok(kept)
}

/// Header fields of one station, keys prefixed with `role`.
pub fn stats_to_dict(header: &TraceHeader, role: &str) -> HeaderFields {
    let field = |name: &str| format!("{}_{}", role, name);
    BTreeMap::from([
        (field("network"), HeaderValue::Text(header.network.clone())),
        (field("station"), HeaderValue::Text(header.station.clone())),
        (field("channel"), HeaderValue::Text(header.channel.clone())),
        (field("delta"), HeaderValue::Number(header.delta)),
        (field("npts"), HeaderValue::Count(header.npts)),
        (field("sampling_rate"), HeaderValue::Number(header.sampling_rate)),
    ])
}

fn column(metrics: &[QualityMetrics], pick: fn(&QualityMetrics) -> f64) -> Vec<f64> {
    metrics.iter().map(pick).collect()
}

/// Assembles the stored header for one correlated pair.
///
/// `locations` is keyed by `NET.STA`; `maxlag` is in seconds.
///
/// # Errors
///
/// Returns [`NoiseError::MissingLocation`] if either station is unknown.
pub fn cross_corr_parameters(
    output: &CorrelationOutput,
    locations: &HashMap<String, StationLocation>,
    maxlag: f64,
) -> Result<CorrelationHeader, NoiseError> {
    let source_loc = locate(locations, &output.source.netsta())?;
    let receiver_loc = locate(locations, &output.receiver.netsta())?;
    let geometry = calc_distance(source_loc, receiver_loc);

    Ok(CorrelationHeader {
        source_mad: column(&output.source_metrics, |m| m.mad_ratio),
        source_std: column(&output.source_metrics, |m| m.std_ratio),
        source_nonzero: column(&output.source_metrics, |m| m.nonzero_fraction),
        receiver_mad: column(&output.receiver_metrics, |m| m.mad_ratio),
        receiver_std: column(&output.receiver_metrics, |m| m.std_ratio),
        receiver_nonzero: column(&output.receiver_metrics, |m| m.nonzero_fraction),
        dist: geometry.dist,
        azi: geometry.azi,
        baz: geometry.baz,
        lag: maxlag,
        starttime: output.windows.iter().map(|w| epoch_seconds(w.start)).collect(),
        endtime: output.windows.iter().map(|w| epoch_seconds(w.end)).collect(),
        source: stats_to_dict(&output.source, "source"),
        receiver: stats_to_dict(&output.receiver, "receiver"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> HashMap<String, StationLocation> {
        HashMap::from([
            ("XX.A".to_string(), StationLocation::new(0.0, 0.0)),
            ("XX.B".to_string(), StationLocation::new(0.0, 1.0)),
            ("XX.C".to_string(), StationLocation::new(1.0, 0.0)),
            ("XX.D".to_string(), StationLocation::new(0.0, 10.0)),
        ])
    }

    #[test]
    fn test_distance_along_equator() {
        let g = calc_distance(&StationLocation::new(0.0, 0.0), &StationLocation::new(0.0, 1.0));
        let expected = EARTH_RADIUS_KM * 1f64.to_radians();
        assert!((g.dist - expected).abs() < 1e-9, "{} vs {}", g.dist, expected);
        assert!((g.azi - 90.0).abs() < 1e-9);
        assert!((g.baz - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_along_meridian() {
        let g = calc_distance(&StationLocation::new(0.0, 0.0), &StationLocation::new(1.0, 0.0));
        assert!(g.azi.abs() < 1e-9);
        assert!((g.baz - 180.0).abs() < 1e-9);
        let same = calc_distance(&StationLocation::new(10.0, 20.0), &StationLocation::new(10.0, 20.0));
        assert_eq!(same.dist, 0.0);
    }

    #[test]
    fn test_filter_dist() {
        let pairs = vec![
            ("XX.A".to_string(), "XX.B".to_string()),
            ("XX.A".to_string(), "XX.D".to_string()),
            ("XX.A".to_string(), "XX.A".to_string()),
        ];
        let kept = filter_dist(&pairs, &locations(), 0.0, 500.0).unwrap();
        assert_eq!(kept, vec![("XX.A".to_string(), "XX.B".to_string())]);
    }

    #[test]
    fn test_filter_dist_missing_station() {
        let pairs = vec![("XX.A".to_string(), "XX.Z".to_string())];
        assert_eq!(
            filter_dist(&pairs, &locations(), 0.0, 500.0),
            Err(NoiseError::MissingLocation("XX.Z".into()))
        );
    }

    #[test]
    fn test_stats_to_dict_keys() {
        use chrono::{TimeZone, Utc};
        let mut header = TraceHeader::new(
            "XX",
            "A",
            "BHZ",
            20.0,
            Utc.with_ymd_and_hms(2017, 1, 13, 0, 0, 0).unwrap(),
        );
        header.npts = 72001;
        let fields = stats_to_dict(&header, "source");
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "source_channel",
                "source_delta",
                "source_network",
                "source_npts",
                "source_sampling_rate",
                "source_station"
            ]
        );
        assert_eq!(fields["source_npts"], HeaderValue::Count(72001));
        assert_eq!(fields["source_network"], HeaderValue::Text("XX".into()));
    }
}
