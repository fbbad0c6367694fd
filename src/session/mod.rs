// Session epoch tracking and per-session buffers

pub mod tracker;
pub mod trajectory;

pub use tracker::{Observation, SessionTracker};
pub use trajectory::{DEFAULT_LOG_ROWS, TrajectoryBuffer};
