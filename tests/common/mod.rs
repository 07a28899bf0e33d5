#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use noisecorr::core::time::add_seconds;
use noisecorr::{Stream, Timestamp, Trace, TraceHeader};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn day_start() -> Timestamp {
    Utc.with_ymd_and_hms(2017, 1, 13, 0, 0, 0).unwrap()
}

/// Deterministic zero-mean white noise in `[-0.5, 0.5)`.
pub fn gen_noise(len: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
        })
        .collect()
}

pub fn make_trace(station: &str, rate: f64, offset_secs: f64, data: Vec<f64>) -> Trace {
    let header = TraceHeader::new("XX", station, "BHZ", rate, add_seconds(day_start(), offset_secs));
    Trace::new(header, data).unwrap()
}

pub fn make_stream(station: &str, rate: f64, offset_secs: f64, data: Vec<f64>) -> Stream {
    Stream::new(vec![make_trace(station, rate, offset_secs, data)])
}

pub fn argmax(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}
