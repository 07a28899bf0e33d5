//! Correlation headers and parameter loading as the storage side sees them.

mod common;

use std::collections::HashMap;

use common::*;
use noisecorr::core::time::epoch_seconds;
use noisecorr::metadata::filter_dist;
use noisecorr::{
    compute_cc, cross_corr_parameters, CorrelationParams, Method, NoiseError, StationLocation,
    TimeNorm,
};

fn locations() -> HashMap<String, StationLocation> {
    HashMap::from([
        ("XX.A".to_string(), StationLocation::new(46.0, 7.0)),
        ("XX.B".to_string(), StationLocation::new(46.5, 7.5)),
        ("XX.FAR".to_string(), StationLocation::new(-33.0, 151.0)),
    ])
}

#[test]
fn test_header_from_pipeline_output() {
    init_logging();
    let data = gen_noise(7201, 21);
    let params = CorrelationParams::new(50.0, 1.0, 0.01, 0.2);
    let out = compute_cc(
        make_stream("A", 1.0, 0.0, data.clone()),
        make_stream("B", 1.0, 0.0, data),
        &params,
    )
    .unwrap();

    let header = cross_corr_parameters(&out, &locations(), params.maxlag).unwrap();
    assert_eq!(header.source_mad.len(), out.windows.len());
    assert_eq!(header.receiver_nonzero.len(), out.windows.len());
    assert_eq!(header.lag, 50.0);
    assert!(header.dist > 60.0 && header.dist < 75.0, "dist {}", header.dist);
    assert!(header.azi > 0.0 && header.azi < 90.0, "azi {}", header.azi);
    assert!(header.baz > 180.0 && header.baz < 270.0, "baz {}", header.baz);
    assert_eq!(header.starttime[0], epoch_seconds(day_start()));
    assert_eq!(header.endtime[0] - header.starttime[0], 3600.0);

    let json = serde_json::to_value(&header).unwrap();
    assert_eq!(json["source_station"], "A");
    assert_eq!(json["receiver_station"], "B");
    assert_eq!(json["source_npts"], 7201);
    assert_eq!(json["receiver_sampling_rate"], 1.0);
    assert!(json["starttime"].is_array());
}

#[test]
fn test_header_missing_location() {
    let data = gen_noise(7201, 22);
    let out = compute_cc(
        make_stream("A", 1.0, 0.0, data.clone()),
        make_stream("NOWHERE", 1.0, 0.0, data),
        &CorrelationParams::new(50.0, 1.0, 0.01, 0.2),
    )
    .unwrap();
    assert_eq!(
        cross_corr_parameters(&out, &locations(), 50.0),
        Err(NoiseError::MissingLocation("XX.NOWHERE".into()))
    );
}

#[test]
fn test_filter_dist_window() {
    let pairs = vec![
        ("XX.A".to_string(), "XX.B".to_string()),
        ("XX.A".to_string(), "XX.FAR".to_string()),
    ];
    let near = filter_dist(&pairs, &locations(), 1.0, 1000.0).unwrap();
    assert_eq!(near, vec![("XX.A".to_string(), "XX.B".to_string())]);
    let far = filter_dist(&pairs, &locations(), 1000.0, 20000.0).unwrap();
    assert_eq!(far, vec![("XX.A".to_string(), "XX.FAR".to_string())]);
}

#[test]
fn test_params_from_json() {
    let json = r#"{
        "maxlag": 200.0,
        "downsamp_freq": 20.0,
        "freqmin": 0.05,
        "freqmax": 5.0,
        "step": 1800.0,
        "cc_len": 3600.0,
        "method": "deconv",
        "time_norm": "one_bit",
        "response_dir": "/data/resp",
        "whiten": false,
        "post_filter": true
    }"#;
    let params: CorrelationParams = serde_json::from_str(json).unwrap();
    assert_eq!(params.method, Method::Deconv);
    assert_eq!(params.time_norm, TimeNorm::OneBit);
    assert!(!params.whiten);
    assert!(params.post_filter);
    assert_eq!(params.maxlag_samples(), 4000.0);
    assert!(params.validate().is_ok());

    let back = serde_json::to_string(&params).unwrap();
    assert!(back.contains("\"method\":\"deconv\""));
}
