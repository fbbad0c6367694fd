use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;

use super::{MapMarker, MapOverlay, MarkerIcon, format_decimal, format_timestamp};

/// Zoom tuned for a course a few tens of meters across.
pub const DEFAULT_ZOOM_LEVEL: u8 = 21;
pub const MAX_ZOOM_LEVEL: u8 = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapComposerConfig {
    pub zoom_level: u8,
    pub max_zoom: u8,
}

impl Default for MapComposerConfig {
    fn default() -> Self {
        Self {
            zoom_level: DEFAULT_ZOOM_LEVEL,
            max_zoom: MAX_ZOOM_LEVEL,
        }
    }
}

/// Builds the map overlay from the vessel trajectory.
#[derive(Debug, Clone, Default)]
pub struct MapComposer {
    config: MapComposerConfig,
}

impl MapComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MapComposerConfig) -> Self {
        Self { config }
    }

    /// Compose the overlay for a trajectory, oldest point first.
    ///
    /// Returns `None` when no point can be mapped, since there is no center to show.
    /// The last point becomes the vessel icon rotated to its course over ground
    /// (0 when unknown); every earlier point is a plain pin. A path joins the points
    /// once there are at least two of them.
    pub fn compose(&self, points: &[TelemetrySample]) -> Option<MapOverlay> {
        self.compose_with_waypoints(points, &[])
    }

    /// Like `compose`, with floating markers drawn as buoys ahead of the track.
    /// Waypoints are never part of the path and never the latest marker.
    pub fn compose_with_waypoints(
        &self,
        points: &[TelemetrySample],
        waypoints: &[TelemetrySample],
    ) -> Option<MapOverlay> {
        let track = points
            .iter()
            .filter_map(|p| p.coordinates().map(|coords| (p, coords)))
            .collect::<Vec<_>>();
        let &(_, center) = track.last()?;
        let last_idx = track.len() - 1;

        let buoys = waypoints.iter().filter_map(|w| {
            w.coordinates().map(|(lat, lon)| MapMarker {
                lat,
                lon,
                popup_text: popup_text(w),
                is_latest: false,
                icon: MarkerIcon::Buoy,
            })
        });

        let track_markers = track.iter().enumerate().map(|(idx, &(point, (lat, lon)))| {
            let is_latest = idx == last_idx;
            let icon = if is_latest {
                MarkerIcon::Vessel {
                    heading_deg: point.course_deg.unwrap_or(0.0),
                }
            } else {
                MarkerIcon::Pin
            };
            MapMarker {
                lat,
                lon,
                popup_text: popup_text(point),
                is_latest,
                icon,
            }
        });

        let path = if track.len() > 1 {
            track.iter().map(|&(_, coords)| coords).collect()
        } else {
            Vec::new()
        };

        Some(MapOverlay {
            center,
            zoom_level: self.config.zoom_level,
            max_zoom: self.config.max_zoom,
            markers: buoys.chain(track_markers).collect(),
            path,
        })
    }

    pub fn config(&self) -> &MapComposerConfig {
        &self.config
    }
}

fn popup_text(sample: &TelemetrySample) -> String {
    [
        format!("Timestamp: {}", format_timestamp(sample.timestamp)),
        format!("Latitude: {}", format_decimal(sample.lat, 6)),
        format!("Longitude: {}", format_decimal(sample.lon, 6)),
        format!("COG: {}", format_decimal(sample.course_deg, 2)),
        format!("Speed (KPH): {}", format_decimal(sample.speed_kph(), 2)),
        format!("Speed (Knots): {}", format_decimal(sample.speed_knots, 2)),
    ]
    .iter()
    .join("<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SampleKind;

    fn point(id: &str, lat: f64, lon: f64, cog: Option<f64>) -> TelemetrySample {
        let mut sample = TelemetrySample::new(id, SampleKind::Position);
        sample.lat = Some(lat);
        sample.lon = Some(lon);
        sample.course_deg = cog;
        sample.speed_knots = Some(5.0);
        sample
    }

    #[test]
    fn test_compose_empty_returns_none() {
        assert!(MapComposer::new().compose(&[]).is_none());
    }

    #[test]
    fn test_compose_single_point() {
        let overlay = MapComposer::new()
            .compose(&[point("p1", -7.8, 110.3, None)])
            .unwrap();
        assert_eq!(overlay.markers.len(), 1);
        assert_eq!(overlay.segment_count(), 0);
        assert!(overlay.path.is_empty());
        assert_eq!(overlay.center, (-7.8, 110.3));
        assert_eq!(overlay.zoom_level, DEFAULT_ZOOM_LEVEL);
        // no course: icon is not rotated
        assert_eq!(
            overlay.markers[0].icon,
            MarkerIcon::Vessel { heading_deg: 0.0 }
        );
    }

    #[test]
    fn test_compose_two_points() {
        let overlay = MapComposer::new()
            .compose(&[
                point("p1", -7.8, 110.3, Some(45.0)),
                point("p2", -7.801, 110.301, Some(90.0)),
            ])
            .unwrap();
        assert_eq!(overlay.segment_count(), 1);
        assert_eq!(overlay.path, vec![(-7.8, 110.3), (-7.801, 110.301)]);
        assert_eq!(overlay.center, (-7.801, 110.301));

        assert_eq!(overlay.markers[0].icon, MarkerIcon::Pin);
        assert!(!overlay.markers[0].is_latest);

        let latest = overlay.latest_marker().unwrap();
        assert_eq!((latest.lat, latest.lon), (-7.801, 110.301));
        assert_eq!(latest.icon, MarkerIcon::Vessel { heading_deg: 90.0 });
    }

    #[test]
    fn test_popup_text_has_both_speed_units() {
        let overlay = MapComposer::new()
            .compose(&[point("p1", -7.8, 110.3, Some(12.5))])
            .unwrap();
        let popup = &overlay.markers[0].popup_text;
        assert!(popup.contains("Timestamp: -"));
        assert!(popup.contains("Latitude: -7.800000"));
        assert!(popup.contains("COG: 12.50"));
        assert!(popup.contains("Speed (KPH): 9.26"));
        assert!(popup.contains("Speed (Knots): 5.00"));
    }

    #[test]
    fn test_unmappable_points_are_skipped() {
        let mut broken = point("p2", 0.0, 0.0, None);
        broken.lat = None;
        let overlay = MapComposer::new()
            .compose(&[point("p1", -7.8, 110.3, None), broken])
            .unwrap();
        assert_eq!(overlay.markers.len(), 1);
        assert!(overlay.markers[0].is_latest);

        let mut lonely = point("p3", 0.0, 0.0, None);
        lonely.lon = None;
        assert!(MapComposer::new().compose(&[lonely]).is_none());
    }

    #[test]
    fn test_waypoints_are_buoys_outside_the_path() {
        let mut buoy = point("bola1", -7.81, 110.31, None);
        buoy.kind = SampleKind::FloatingMarker;

        let overlay = MapComposer::new()
            .compose_with_waypoints(&[point("posisi", -7.8, 110.3, Some(90.0))], &[buoy])
            .unwrap();
        assert_eq!(overlay.markers.len(), 2);
        assert_eq!(overlay.markers[0].icon, MarkerIcon::Buoy);
        assert!(!overlay.markers[0].is_latest);
        assert!(overlay.markers[1].is_latest);
        assert!(overlay.path.is_empty());
        assert_eq!(overlay.center, (-7.8, 110.3));

        // buoys alone do not make a map
        assert!(
            MapComposer::new()
                .compose_with_waypoints(&[], &[point("bola1", 1.0, 1.0, None)])
                .is_none()
        );
    }

    #[test]
    fn test_custom_zoom() {
        let composer = MapComposer::with_config(MapComposerConfig {
            zoom_level: 18,
            max_zoom: 20,
        });
        let overlay = composer.compose(&[point("p1", 1.0, 1.0, None)]).unwrap();
        assert_eq!(overlay.zoom_level, 18);
        assert_eq!(overlay.max_zoom, 20);
    }
}
