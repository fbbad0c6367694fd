// Unit conversion and field validation for raw telemetry values

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::errors::HelmsmanError;

/// Kilometres per hour in one knot.
pub const KPH_PER_KNOT: f64 = 1.852;

const MAX_LATITUDE_DEG: f64 = 90.0;
const MAX_LONGITUDE_DEG: f64 = 180.0;

// Epoch values above this are taken as milliseconds (year 2286 in seconds).
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

const DATE_TIME_FORMATS: [&str; 10] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn limit(&self) -> f64 {
        match self {
            Axis::Latitude => MAX_LATITUDE_DEG,
            Axis::Longitude => MAX_LONGITUDE_DEG,
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Axis::Latitude => "lat",
            Axis::Longitude => "lon",
        }
    }
}

pub fn knots_to_kph(knots: f64) -> f64 {
    knots * KPH_PER_KNOT
}

/// Parse a coordinate and check it against the range for `axis`.
pub fn parse_coordinate(raw: &Value, axis: Axis) -> Result<f64, HelmsmanError> {
    let malformed = || HelmsmanError::MalformedCoordinate {
        field: axis.field().to_string(),
        raw: raw.to_string(),
    };

    let value = parse_measurement(raw).ok_or_else(malformed)?;
    if value.abs() > axis.limit() {
        return Err(malformed());
    }
    Ok(value)
}

/// Lenient numeric parse used for speeds and headings. Accepts JSON numbers and
/// numeric strings; anything non-finite is treated as absent.
pub fn parse_measurement(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Lenient date-time parse. Malformed input yields `None` instead of an error.
pub fn parse_timestamp(raw: &Value) -> Option<NaiveDateTime> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|secs| secs.is_finite())
                    .map(|secs| secs.trunc() as i64)
            })
            .and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(from_epoch);
    }

    // offsets are dropped, the wall-clock time as written is kept
    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_time.naive_local());
    }
    if let Ok(date_time) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%z") {
        return Some(date_time.naive_local());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn from_epoch(value: i64) -> Option<NaiveDateTime> {
    let date_time = if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD as u64 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    };
    date_time.map(|dt| dt.naive_utc())
}
