// Map overlay composition, geotag text and SVG snapshots of the trajectory

pub mod composer;
pub mod geotag;
pub mod svg_generator;

pub use composer::{DEFAULT_ZOOM_LEVEL, MAX_ZOOM_LEVEL, MapComposer, MapComposerConfig};
pub use geotag::{GeotagSummary, coordinate_text, format_geotag};
pub use svg_generator::{OverlaySvgConfig, OverlaySvgGenerator, SvgMapSurface};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Text shown in place of any value that is absent or could not be parsed.
pub const PLACEHOLDER: &str = "-";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a marker is drawn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum MarkerIcon {
    /// Plain pin for an earlier vessel position
    Pin,
    /// Floating ball course marker
    Buoy,
    /// The vessel itself, rotated to its course over ground
    Vessel { heading_deg: f64 },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapMarker {
    pub lat: f64,
    pub lon: f64,
    pub popup_text: String,
    pub is_latest: bool,
    pub icon: MarkerIcon,
}

/// Everything a map widget needs to draw the live picture.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapOverlay {
    /// Coordinates of the most recent vessel position
    pub center: (f64, f64),
    pub zoom_level: u8,
    pub max_zoom: u8,
    pub markers: Vec<MapMarker>,
    /// Ordered vessel path, empty when fewer than two positions are known
    pub path: Vec<(f64, f64)>,
}

impl MapOverlay {
    pub fn segment_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn latest_marker(&self) -> Option<&MapMarker> {
        self.markers.iter().find(|m| m.is_latest)
    }
}

pub(crate) fn format_decimal(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub(crate) fn format_timestamp(timestamp: Option<NaiveDateTime>) -> String {
    timestamp
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}
