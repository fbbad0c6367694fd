pub mod classifier;
pub mod collector;
pub mod store;
pub mod validator;

pub use classifier::{ClassifiedSnapshot, classify_snapshot};
pub use collector::{PollLoop, PollLoopConfig, TrackerState};
pub use store::{FirebaseStore, MockStore, StoreInfo, TelemetryStore};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use validator::knots_to_kph;

/// Key of the distinguished current-position record inside a session folder.
pub const POSITION_KEY: &str = "posisi";
/// Key of the recorded track of the session, oldest fix first.
pub const HISTORY_KEY: &str = "gps_data";

/// The kind of a telemetry record, resolved from its key in the session folder.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// The vessel itself
    Position,
    /// Floating ball course marker
    FloatingMarker,
    /// Underwater reference probe
    UnderwaterProbe,
    /// Surface reference probe
    SurfaceProbe,
}

impl SampleKind {
    const PREFIXED: [SampleKind; 3] = [
        SampleKind::FloatingMarker,
        SampleKind::UnderwaterProbe,
        SampleKind::SurfaceProbe,
    ];

    /// Identifier prefix used by the store for this kind of record.
    pub fn prefix(&self) -> &'static str {
        match self {
            SampleKind::Position => POSITION_KEY,
            SampleKind::FloatingMarker => "bola",
            SampleKind::UnderwaterProbe => "underwater",
            SampleKind::SurfaceProbe => "surface",
        }
    }

    /// Resolve a non-position record key by exact, case-sensitive prefix match.
    pub fn from_key(key: &str) -> Option<SampleKind> {
        Self::PREFIXED
            .into_iter()
            .find(|kind| key.starts_with(kind.prefix()))
    }
}

/// A record as stored remotely. Every field is optional and may hold a number,
/// a string or anything else the producer decided to write.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawRecord {
    pub timestamp: Option<Value>,
    pub lat: Option<Value>,
    pub lon: Option<Value>,
    pub speed_knots: Option<Value>,
    pub cog: Option<Value>,
}

/// A validated telemetry sample.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    pub id: String,
    pub kind: SampleKind,
    pub timestamp: Option<NaiveDateTime>,
    /// Latitude in decimal degrees, absent when missing or malformed
    pub lat: Option<f64>,
    /// Longitude in decimal degrees, absent when missing or malformed
    pub lon: Option<f64>,
    pub speed_knots: Option<f64>,
    /// Course over ground in degrees
    pub course_deg: Option<f64>,
}

impl TelemetrySample {
    pub fn new(id: impl Into<String>, kind: SampleKind) -> Self {
        Self {
            id: id.into(),
            kind,
            timestamp: None,
            lat: None,
            lon: None,
            speed_knots: None,
            course_deg: None,
        }
    }

    /// Speed in km/h, always derived from the knots reading.
    pub fn speed_kph(&self) -> Option<f64> {
        self.speed_knots.map(knots_to_kph)
    }

    /// Both coordinates, or `None` when the sample cannot be mapped.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    pub fn is_mappable(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Same reading as `other`: identical timestamp and coordinates.
    pub fn same_fix(&self, other: &TelemetrySample) -> bool {
        self.timestamp == other.timestamp && self.coordinates() == other.coordinates()
    }
}
