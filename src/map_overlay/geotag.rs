// Fixed-format geotag block shown under the map and the probe snapshots

use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;

use super::{PLACEHOLDER, format_decimal};

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Human-readable description of one sample. Every field falls back to the
/// placeholder on its own when its source value is missing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeotagSummary {
    pub day_of_week: String,
    pub date: String,
    pub time: String,
    pub coordinate_text: String,
    pub speed_text: String,
    pub course_text: String,
}

impl GeotagSummary {
    pub fn from_sample(sample: &TelemetrySample) -> Self {
        let (day_of_week, date, time) = match sample.timestamp {
            Some(ts) => (
                day_name(&ts).to_string(),
                ts.format("%d/%m/%Y").to_string(),
                ts.format("%H:%M:%S").to_string(),
            ),
            None => (
                PLACEHOLDER.to_string(),
                PLACEHOLDER.to_string(),
                PLACEHOLDER.to_string(),
            ),
        };

        let coordinate_text = sample
            .coordinates()
            .map(|(lat, lon)| coordinate_text(lat, lon))
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        let speed_text = format!(
            "{} knots / {} km/h",
            format_decimal(sample.speed_knots, 0),
            format_decimal(sample.speed_kph(), 0)
        );

        let course_text = sample
            .course_deg
            .map(|cog| format!("{:.2}°", cog))
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        Self {
            day_of_week,
            date,
            time,
            coordinate_text,
            speed_text,
            course_text,
        }
    }
}

impl fmt::Display for GeotagSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Geo-tag Infos:")?;
        writeln!(f, "Day: {}", self.day_of_week)?;
        writeln!(f, "Date: {}", self.date)?;
        writeln!(f, "Time: {}", self.time)?;
        writeln!(f, "Coordinate: [{}]", self.coordinate_text)?;
        writeln!(f, "Speed Over Ground: {}", self.speed_text)?;
        write!(f, "Course Over Ground: {}", self.course_text)
    }
}

pub fn format_geotag(sample: &TelemetrySample) -> GeotagSummary {
    GeotagSummary::from_sample(sample)
}

fn day_name(timestamp: &NaiveDateTime) -> &'static str {
    DAY_NAMES[timestamp.weekday().num_days_from_sunday() as usize]
}

/// Decimal-degree coordinate text with hemisphere letters, e.g. `S 7.80123, E 110.36456`.
pub fn coordinate_text(lat: f64, lon: f64) -> String {
    format!(
        "{} {:.5}, {} {:.5}",
        if lat < 0.0 { 'S' } else { 'N' },
        degrees_minutes_to_decimal(lat),
        if lon < 0.0 { 'W' } else { 'E' },
        degrees_minutes_to_decimal(lon),
    )
}

// Split into whole degrees and decimal minutes, then fold back into one
// unsigned decimal-degree value.
fn degrees_minutes_to_decimal(value: f64) -> f64 {
    let magnitude = value.abs();
    let degrees = magnitude.trunc();
    let minutes = (magnitude - degrees) * 60.0;
    degrees + minutes / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SampleKind;
    use chrono::NaiveDate;

    fn sample_at(ts: Option<NaiveDateTime>) -> TelemetrySample {
        let mut sample = TelemetrySample::new("posisi", SampleKind::Position);
        sample.timestamp = ts;
        sample
    }

    #[test]
    fn test_date_and_time_fields() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 10).and_then(|d| d.and_hms_opt(14, 5, 30));
        let summary = format_geotag(&sample_at(ts));
        assert_eq!(summary.day_of_week, "Sun");
        assert_eq!(summary.date, "10/03/2024");
        assert_eq!(summary.time, "14:05:30");
    }

    #[test]
    fn test_day_table_covers_whole_week() {
        // 2024-03-11 is a Monday
        let names = (11..=17)
            .map(|day| {
                let ts = NaiveDate::from_ymd_opt(2024, 3, day).and_then(|d| d.and_hms_opt(0, 0, 0));
                format_geotag(&sample_at(ts)).day_of_week
            })
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
    }

    #[test]
    fn test_coordinate_text() {
        assert_eq!(coordinate_text(-7.80123, 110.36456), "S 7.80123, E 110.36456");
        assert_eq!(coordinate_text(51.5, -0.12), "N 51.50000, W 0.12000");
        assert_eq!(coordinate_text(0.0, 0.0), "N 0.00000, E 0.00000");
    }

    #[test]
    fn test_speed_and_course_text() {
        let mut sample = sample_at(None);
        sample.speed_knots = Some(5.0);
        sample.course_deg = Some(90.0);
        let summary = format_geotag(&sample);
        assert_eq!(summary.speed_text, "5 knots / 9 km/h");
        assert_eq!(summary.course_text, "90.00°");
    }

    #[test]
    fn test_fields_fall_back_independently() {
        let mut sample = sample_at(None);
        sample.lat = Some(-7.8);
        sample.lon = Some(110.3);
        let summary = format_geotag(&sample);
        assert_eq!(summary.day_of_week, "-");
        assert_eq!(summary.date, "-");
        assert_eq!(summary.time, "-");
        assert_eq!(summary.coordinate_text, "S 7.80000, E 110.30000");
        assert_eq!(summary.speed_text, "- knots / - km/h");
        assert_eq!(summary.course_text, "-");
    }

    #[test]
    fn test_display_block() {
        let mut sample = sample_at(
            NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        );
        sample.lat = Some(-7.8);
        sample.lon = Some(110.3);
        sample.speed_knots = Some(5.0);
        sample.course_deg = Some(90.0);

        let text = format_geotag(&sample).to_string();
        assert_eq!(
            text,
            "Geo-tag Infos:\n\
             Day: Mon\n\
             Date: 01/01/2024\n\
             Time: 00:00:00\n\
             Coordinate: [S 7.80000, E 110.30000]\n\
             Speed Over Ground: 5 knots / 9 km/h\n\
             Course Over Ground: 90.00°"
        );
    }
}
