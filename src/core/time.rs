//! UTC timestamp arithmetic and step-grid alignment.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::error::NoiseError;

/// Absolute sample time, nanosecond precision.
pub type Timestamp = DateTime<Utc>;

/// Number of seconds in a (non-leap) day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Returns `t + secs`, rounded to the nearest nanosecond.
#[inline]
pub fn add_seconds(t: Timestamp, secs: f64) -> Timestamp {
    t + Duration::nanoseconds((secs * 1e9).round() as i64)
}

/// Signed number of seconds from `from` to `to`.
#[inline]
pub fn seconds_between(from: Timestamp, to: Timestamp) -> f64 {
    let d = to.signed_duration_since(from);
    match d.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => d.num_milliseconds() as f64 * 1e-3,
    }
}

/// Seconds elapsed since the last whole second, in `[0, 1)`.
#[inline]
pub fn subsecond(t: Timestamp) -> f64 {
    (t.nanosecond() % 1_000_000_000) as f64 * 1e-9
}

/// UTC midnight of the calendar day containing `t`.
pub fn midnight(t: Timestamp) -> Timestamp {
    let since = t.num_seconds_from_midnight() as i64 * 1_000_000_000
        + (t.nanosecond() % 1_000_000_000) as i64;
    t - Duration::nanoseconds(since)
}

/// Epoch seconds as a float, the form downstream containers store.
#[inline]
pub fn epoch_seconds(t: Timestamp) -> f64 {
    t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 * 1e-9
}

/// Snaps two timestamps onto a shared `step`-second grid.
///
/// Each timestamp moves to the nearest multiple of `step` seconds counted
/// from its own UTC midnight (the tick list runs from that midnight through
/// the next one). Ties resolve to the earlier tick. Equal inputs are returned
/// unchanged.
///
/// # Errors
///
/// Returns [`NoiseError::InvalidParameter`] if `step` is not positive.
pub fn nearest_step(
    t1: Timestamp,
    t2: Timestamp,
    step: f64,
) -> Result<(Timestamp, Timestamp), NoiseError> {
    if t1 == t2 {
        return Ok((t1, t2));
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(NoiseError::InvalidParameter(format!(
            "alignment step must be positive, got {}",
            step
        )));
    }
    Ok((snap_to_day_grid(t1, step), snap_to_day_grid(t2, step)))
}

fn snap_to_day_grid(t: Timestamp, step: f64) -> Timestamp {
    let day_start = midnight(t);
    let ticks = (SECONDS_PER_DAY / step).ceil() as usize + 1;

    let mut best = day_start;
    let mut best_diff = f64::INFINITY;
    for k in 0..ticks {
        let tick = add_seconds(day_start, k as f64 * step);
        let diff = seconds_between(t, tick).abs();
        if diff < best_diff {
            best_diff = diff;
            best = tick;
        }
    }
    best
}
