// Library interface for helmsman
// This allows integration tests and benches to access internal modules

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod map_overlay;
pub mod session;
pub mod surface;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::AppConfig;
pub use dashboard::{CycleStatus, DashboardFrame};
pub use errors::HelmsmanError;
pub use map_overlay::{GeotagSummary, MapComposer, MapOverlay, format_geotag};
pub use session::{SessionTracker, TrajectoryBuffer};
pub use surface::RenderSurface;
pub use telemetry::{
    FirebaseStore, MockStore, PollLoop, PollLoopConfig, SampleKind, TelemetrySample,
    TelemetryStore, classify_snapshot,
};
