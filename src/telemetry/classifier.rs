// Splits a raw session folder into typed, validated samples

use itertools::Itertools;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::errors::HelmsmanError;

use super::{
    HISTORY_KEY, POSITION_KEY, RawRecord, SampleKind, TelemetrySample,
    validator::{Axis, parse_coordinate, parse_measurement, parse_timestamp},
};

/// Samples extracted from one session folder snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassifiedSnapshot {
    /// The vessel's current position (`posisi` record)
    pub position: Option<TelemetrySample>,
    /// Every floating marker, in key order
    pub floating_markers: Vec<TelemetrySample>,
    /// The single underwater probe kept for display
    pub underwater: Option<TelemetrySample>,
    /// The single surface probe kept for display
    pub surface: Option<TelemetrySample>,
    /// Mappable fixes of the recorded track (`gps_data`), oldest first
    pub history: Vec<TelemetrySample>,
    /// Number of records whose coordinates were malformed
    pub malformed: usize,
}

impl ClassifiedSnapshot {
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.floating_markers.is_empty()
            && self.underwater.is_none()
            && self.surface.is_none()
            && self.history.is_empty()
    }
}

/// Classify every record of a session folder.
///
/// The current position comes from the `posisi` key. All other keys are matched
/// against the known prefixes; records matching none of them, and values that are
/// not objects, are ignored. When several underwater or surface probes are present
/// the one with the latest timestamp is kept; ties (and probes without timestamps)
/// go to the lexically last key, so the result never depends on store ordering.
pub fn classify_snapshot(folder: &Map<String, Value>) -> ClassifiedSnapshot {
    let mut classified = ClassifiedSnapshot::default();
    let mut underwater = Vec::new();
    let mut surface = Vec::new();

    for key in folder.keys().sorted() {
        if key == HISTORY_KEY {
            let (history, malformed) = classify_history(&folder[key]);
            classified.history = history;
            classified.malformed += malformed;
            continue;
        }

        let kind = if key == POSITION_KEY {
            SampleKind::Position
        } else if let Some(kind) = SampleKind::from_key(key) {
            kind
        } else {
            continue;
        };

        let raw: RawRecord = match serde_json::from_value(folder[key].clone()) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Ignoring record '{}' that is not a telemetry object: {}", key, e);
                continue;
            }
        };

        let (sample, malformed) = validate_record(key, kind, &raw);
        if malformed {
            classified.malformed += 1;
        }

        match kind {
            SampleKind::Position => classified.position = Some(sample),
            SampleKind::FloatingMarker => classified.floating_markers.push(sample),
            SampleKind::UnderwaterProbe => underwater.push(sample),
            SampleKind::SurfaceProbe => surface.push(sample),
        }
    }

    classified.underwater = latest_probe(underwater);
    classified.surface = latest_probe(surface);
    classified
}

/// Validate a raw record once, at ingestion. A malformed coordinate strips both
/// coordinates from the sample but keeps the rest of it; the returned flag says
/// whether that happened.
pub fn validate_record(id: &str, kind: SampleKind, raw: &RawRecord) -> (TelemetrySample, bool) {
    let mut sample = TelemetrySample::new(id, kind);
    sample.timestamp = raw.timestamp.as_ref().and_then(parse_timestamp);
    sample.speed_knots = raw.speed_knots.as_ref().and_then(parse_measurement);
    sample.course_deg = raw.cog.as_ref().and_then(parse_measurement);

    let mut malformed = false;
    let mut checked = |field: Option<Result<f64, HelmsmanError>>| match field {
        Some(Ok(value)) => Some(value),
        Some(Err(err)) => {
            warn!("Record '{}' dropped from the map: {}", id, err);
            malformed = true;
            None
        }
        None => None,
    };
    let lat = checked(raw.lat.as_ref().map(|v| parse_coordinate(v, Axis::Latitude)));
    let lon = checked(raw.lon.as_ref().map(|v| parse_coordinate(v, Axis::Longitude)));

    if !malformed {
        sample.lat = lat;
        sample.lon = lon;
    }

    (sample, malformed)
}

/// Validate the recorded track. The store keeps it either as a JSON array or,
/// once entries have been pushed, as an object keyed by push id; keys sort in
/// push order. Entries that cannot be mapped are left out.
fn classify_history(raw: &Value) -> (Vec<TelemetrySample>, usize) {
    let entries: Vec<(String, &Value)> = match raw {
        Value::Array(points) => points
            .iter()
            .enumerate()
            .map(|(idx, point)| (format!("{}/{}", HISTORY_KEY, idx), point))
            .collect(),
        Value::Object(points) => points
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(key, point)| (format!("{}/{}", HISTORY_KEY, key), point))
            .collect(),
        _ => {
            debug!("Ignoring '{}' that is neither a list nor an object", HISTORY_KEY);
            return (Vec::new(), 0);
        }
    };

    let mut malformed = 0;
    let history: Vec<TelemetrySample> = entries
        .into_iter()
        .filter_map(|(id, point)| {
            let raw: RawRecord = serde_json::from_value(point.clone()).ok()?;
            let (sample, bad) = validate_record(&id, SampleKind::Position, &raw);
            if bad {
                malformed += 1;
            }
            sample.is_mappable().then_some(sample)
        })
        .collect();
    (history, malformed)
}

fn latest_probe(probes: Vec<TelemetrySample>) -> Option<TelemetrySample> {
    if probes.len() > 1 {
        debug!(
            "{} {:?} records in one snapshot, keeping the latest",
            probes.len(),
            probes[0].kind
        );
    }
    probes
        .into_iter()
        .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
}
