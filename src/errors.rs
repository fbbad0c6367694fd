// Error types for helmsman

use crate::dashboard::DashboardFrame;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum HelmsmanError {
    // Errors for the remote telemetry store
    #[snafu(display("Unable to reach telemetry store at {url}"))]
    StoreConnectionFailed {
        url: String,
        source: Box<ureq::Error>,
    },
    #[snafu(display("Telemetry store request to {url} failed"))]
    NetworkFailure {
        url: String,
        source: Box<ureq::Error>,
    },
    #[snafu(display("Telemetry store unavailable: {description}"))]
    StoreUnavailable { description: String },
    #[snafu(display("Could not decode telemetry store response from {url}"))]
    StoreDecodeError { url: String, source: io::Error },
    #[snafu(display("Counter not found in node '{node}'"))]
    MissingCounter { node: String },
    #[snafu(display("No data found in folder: {folder}"))]
    EmptyFolder { folder: String },
    #[snafu(display("Telemetry store has no more snapshots"))]
    StoreExhausted,

    // Sample-local validation errors
    #[snafu(display("Malformed {field} coordinate: {raw}"))]
    MalformedCoordinate { field: String, raw: String },

    // Errors for the frame writer and other rendering surfaces
    #[snafu(display("Error broadcasting dashboard frame"))]
    FrameBroadcastError {
        source: Box<SendError<DashboardFrame>>,
    },
    #[snafu(display("Error writing frame file"))]
    WriterError { source: io::Error },
    #[snafu(display("SVG generation failed: {reason}"))]
    SvgGenerationError { reason: String },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Replay errors
    #[snafu(display("Invalid replay file: {path}"))]
    InvalidReplayFile { path: String },
    #[snafu(display("Error loading replay file"))]
    ReplayLoaderError { source: io::Error },
}

impl From<SendError<DashboardFrame>> for HelmsmanError {
    fn from(value: SendError<DashboardFrame>) -> Self {
        HelmsmanError::FrameBroadcastError {
            source: Box::new(value),
        }
    }
}

impl HelmsmanError {
    /// Steady-state failures the poll loop absorbs and retries on the next tick.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            HelmsmanError::NetworkFailure { .. }
                | HelmsmanError::StoreUnavailable { .. }
                | HelmsmanError::StoreDecodeError { .. }
                | HelmsmanError::MissingCounter { .. }
                | HelmsmanError::EmptyFolder { .. }
                | HelmsmanError::MalformedCoordinate { .. }
        )
    }

    /// Whether this soft failure came from the network, used for backoff.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            HelmsmanError::NetworkFailure { .. }
                | HelmsmanError::StoreUnavailable { .. }
                | HelmsmanError::StoreDecodeError { .. }
        )
    }
}
