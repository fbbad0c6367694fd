// Output bundle handed to the rendering surface once per poll cycle

use serde::{Deserialize, Serialize};

use crate::map_overlay::{
    GeotagSummary, MapOverlay, PLACEHOLDER, coordinate_text, format_decimal, format_timestamp,
};
use crate::telemetry::{StoreInfo, TelemetrySample};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum CycleStatus {
    /// New data was fetched this cycle
    Fresh,
    /// The fetch failed; the frame shows the unchanged session state
    Skipped { reason: String },
}

/// One row of the position log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogRow {
    /// Arrival number of the sample within the session, starting at 1
    pub seq: usize,
    pub id: String,
    pub timestamp: String,
    pub coordinate: String,
    pub speed_kph: String,
    pub speed_knots: String,
    pub course: String,
}

impl LogRow {
    pub fn from_sample(seq: usize, sample: &TelemetrySample) -> Self {
        Self {
            seq,
            id: sample.id.clone(),
            timestamp: format_timestamp(sample.timestamp),
            coordinate: sample
                .coordinates()
                .map(|(lat, lon)| coordinate_text(lat, lon))
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            speed_kph: format_decimal(sample.speed_kph(), 2),
            speed_knots: format_decimal(sample.speed_knots, 2),
            course: format_decimal(sample.course_deg, 2),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadoutRow {
    pub label: String,
    pub value: String,
}

/// Label/value table for the vessel's current reading.
pub fn position_readout(sample: &TelemetrySample) -> Vec<ReadoutRow> {
    [
        ("Latitude", format_decimal(sample.lat, 6)),
        ("Longitude", format_decimal(sample.lon, 6)),
        ("Speed (Knots)", format_decimal(sample.speed_knots, 2)),
        ("Speed (KPH)", format_decimal(sample.speed_kph(), 2)),
        ("COG", format_decimal(sample.course_deg, 2)),
        ("Timestamp", format_timestamp(sample.timestamp)),
    ]
    .into_iter()
    .map(|(label, value)| ReadoutRow {
        label: label.to_string(),
        value,
    })
    .collect()
}

/// Everything the rendering surface shows for one cycle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardFrame {
    pub cycle: u64,
    pub status: CycleStatus,
    /// Course name, stream link and counter of the active session
    pub info: Option<StoreInfo>,
    pub folder_id: Option<String>,
    pub position_readout: Vec<ReadoutRow>,
    /// Latest positions, oldest first
    pub log_table: Vec<LogRow>,
    pub map_overlay: Option<MapOverlay>,
    pub vessel_geotag: Option<GeotagSummary>,
    pub underwater_geotag: Option<GeotagSummary>,
    pub surface_geotag: Option<GeotagSummary>,
    pub floating_markers: Vec<LogRow>,
}

impl DashboardFrame {
    pub fn is_fresh(&self) -> bool {
        self.status == CycleStatus::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SampleKind;

    fn sample() -> TelemetrySample {
        let mut sample = TelemetrySample::new("posisi", SampleKind::Position);
        sample.lat = Some(-7.80123);
        sample.lon = Some(110.36456);
        sample.speed_knots = Some(10.0);
        sample.course_deg = Some(181.456);
        sample
    }

    #[test]
    fn test_log_row_from_sample() {
        let row = LogRow::from_sample(3, &sample());
        assert_eq!(row.seq, 3);
        assert_eq!(row.id, "posisi");
        assert_eq!(row.timestamp, "-");
        assert_eq!(row.coordinate, "S 7.80123, E 110.36456");
        assert_eq!(row.speed_kph, "18.52");
        assert_eq!(row.speed_knots, "10.00");
        assert_eq!(row.course, "181.46");
    }

    #[test]
    fn test_log_row_without_coordinates() {
        let mut sample = sample();
        sample.lon = None;
        assert_eq!(LogRow::from_sample(1, &sample).coordinate, "-");
    }

    #[test]
    fn test_position_readout_labels() {
        let rows = position_readout(&sample());
        let labels = rows.iter().map(|r| r.label.as_str()).collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec!["Latitude", "Longitude", "Speed (Knots)", "Speed (KPH)", "COG", "Timestamp"]
        );
        assert_eq!(rows[0].value, "-7.801230");
        assert_eq!(rows[5].value, "-");
    }
}
