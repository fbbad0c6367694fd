// SVG snapshot of the map overlay, for surfaces without a slippy map

use std::{fs, path::PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{HelmsmanError, dashboard::DashboardFrame, surface::RenderSurface};

use super::{MapOverlay, MarkerIcon};

/// Configuration for SVG overlay generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySvgConfig {
    /// Canvas dimensions (width, height) in pixels
    pub canvas_size: (u32, u32),
    /// Stroke width for the vessel path
    pub stroke_width: f32,
    /// Margin around the trajectory as percentage of canvas size
    pub margin_percentage: f32,
    /// Radius of position and buoy markers
    pub marker_radius: f32,
}

impl Default for OverlaySvgConfig {
    fn default() -> Self {
        Self {
            canvas_size: (800, 600),
            stroke_width: 2.5,
            margin_percentage: 0.1, // 10% margin
            marker_radius: 5.0,
        }
    }
}

/// Represents a 2D coordinate point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box for coordinate calculations
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn update(&mut self, point: Point2D) {
        self.min_x = self.min_x.min(point.x);
        self.max_x = self.max_x.max(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_y = self.max_y.max(point.y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws a `MapOverlay` as a standalone SVG document.
pub struct OverlaySvgGenerator {
    config: OverlaySvgConfig,
}

impl OverlaySvgGenerator {
    pub fn new() -> Self {
        Self {
            config: OverlaySvgConfig::default(),
        }
    }

    pub fn with_config(config: OverlaySvgConfig) -> Self {
        Self { config }
    }

    /// Generate the SVG for an overlay.
    ///
    /// Coordinates are projected equirectangularly around the overlay center, which
    /// is accurate enough for the few hundred meters a course spans, and then fitted
    /// uniformly into the canvas with north up.
    pub fn generate_svg(&self, overlay: &MapOverlay) -> Result<String, HelmsmanError> {
        if self.config.stroke_width <= 0.0 || self.config.stroke_width > 50.0 {
            return Err(HelmsmanError::SvgGenerationError {
                reason: format!(
                    "Invalid stroke width: {} (must be 0.1-50.0)",
                    self.config.stroke_width
                ),
            });
        }
        if overlay.markers.is_empty() {
            return Err(HelmsmanError::SvgGenerationError {
                reason: "Cannot generate SVG from an overlay without markers".to_string(),
            });
        }

        let cos_lat = overlay.center.0.to_radians().cos();
        let project = |(lat, lon): (f64, f64)| Point2D::new(lon * cos_lat, lat);

        let mut bbox = BoundingBox::new();
        for marker in &overlay.markers {
            bbox.update(project((marker.lat, marker.lon)));
        }
        let to_canvas = self.fit_to_canvas(&bbox);

        let (width, height) = self.config.canvas_size;
        let mut svg = String::with_capacity(1024 + overlay.markers.len() * 80);
        svg.push_str(&format!(
            r#"<svg width="{}" height="{}" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">
  <defs>
    <style>
      .vessel-path {{ stroke: #1f5fbf; stroke-width: {:.2}; fill: none; stroke-linecap: round; stroke-linejoin: round; }}
      .position {{ fill: #1f5fbf; stroke: #fff; stroke-width: 1; }}
      .buoy {{ fill: #f2613f; stroke: #000; stroke-width: 1; }}
      .vessel {{ fill: #005eb8; stroke: #000; stroke-width: 1; }}
    </style>
  </defs>"#,
            width, height, width, height, self.config.stroke_width
        ));

        if overlay.path.len() > 1 {
            let points = overlay
                .path
                .iter()
                .map(|&coords| to_canvas(project(coords)))
                .map(|p| format!("{:.2},{:.2}", p.x, p.y))
                .collect::<Vec<_>>()
                .join(" ");
            svg.push_str(&format!(
                "\n  <polyline class=\"vessel-path\" points=\"{}\" />",
                points
            ));
        }

        let r = f64::from(self.config.marker_radius);
        for marker in &overlay.markers {
            let p = to_canvas(project((marker.lat, marker.lon)));
            if !p.x.is_finite() || !p.y.is_finite() {
                warn!("Skipping marker with non-finite position ({}, {})", marker.lat, marker.lon);
                continue;
            }
            match marker.icon {
                MarkerIcon::Pin => svg.push_str(&format!(
                    "\n  <circle class=\"position\" cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.1}\" />",
                    p.x, p.y, r
                )),
                MarkerIcon::Buoy => svg.push_str(&format!(
                    "\n  <circle class=\"buoy\" cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.1}\" />",
                    p.x, p.y, r
                )),
                // arrow pointing north, rotated clockwise to the course over ground
                MarkerIcon::Vessel { heading_deg } => svg.push_str(&format!(
                    "\n  <polygon class=\"vessel\" points=\"{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}\" transform=\"rotate({:.2} {:.2} {:.2})\" />",
                    p.x,
                    p.y - 3.0 * r,
                    p.x - 1.5 * r,
                    p.y + 1.5 * r,
                    p.x + 1.5 * r,
                    p.y + 1.5 * r,
                    heading_deg,
                    p.x,
                    p.y
                )),
            }
        }

        svg.push_str(&format!(
            "\n  <!-- {} markers, {} path segments -->",
            overlay.markers.len(),
            overlay.segment_count()
        ));
        svg.push_str("\n</svg>");

        debug!("Generated overlay SVG with {} characters", svg.len());
        Ok(svg)
    }

    // Uniform scale so the course keeps its shape; y is flipped so north is up.
    fn fit_to_canvas(&self, bbox: &BoundingBox) -> impl Fn(Point2D) -> Point2D {
        let (width, height) = (
            self.config.canvas_size.0 as f64,
            self.config.canvas_size.1 as f64,
        );
        let margin = self.config.margin_percentage as f64;
        let usable_w = width * (1.0 - 2.0 * margin);
        let usable_h = height * (1.0 - 2.0 * margin);

        let scale = match (bbox.width() > 0.0, bbox.height() > 0.0) {
            (true, true) => (usable_w / bbox.width()).min(usable_h / bbox.height()),
            (true, false) => usable_w / bbox.width(),
            (false, true) => usable_h / bbox.height(),
            // a single position sits in the middle of the canvas
            (false, false) => 0.0,
        };
        let center = bbox.center();

        move |p: Point2D| {
            Point2D::new(
                width / 2.0 + (p.x - center.x) * scale,
                height / 2.0 - (p.y - center.y) * scale,
            )
        }
    }

    pub fn config(&self) -> &OverlaySvgConfig {
        &self.config
    }
}

impl Default for OverlaySvgGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps an SVG file on disk in sync with the latest map overlay.
pub struct SvgMapSurface {
    path: PathBuf,
    generator: OverlaySvgGenerator,
}

impl SvgMapSurface {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            generator: OverlaySvgGenerator::new(),
        }
    }
}

impl RenderSurface for SvgMapSurface {
    fn publish(&mut self, frame: &DashboardFrame) -> Result<(), HelmsmanError> {
        // no overlay, nothing to draw: the previous snapshot stays on disk
        let Some(overlay) = &frame.map_overlay else {
            return Ok(());
        };
        let svg = self.generator.generate_svg(overlay)?;
        fs::write(&self.path, svg).map_err(|e| HelmsmanError::WriterError { source: e })
    }
}
