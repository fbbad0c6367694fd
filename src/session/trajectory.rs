use log::debug;

use crate::telemetry::{SampleKind, TelemetrySample};

/// Number of rows shown in the position log.
pub const DEFAULT_LOG_ROWS: usize = 10;

/// Position samples of the active session, in arrival order.
///
/// The buffer is never re-sorted by timestamp. The log view is capped, the map
/// view returns everything since the last `clear()` unless a cap is requested.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryBuffer {
    samples: Vec<TelemetrySample>,
}

impl TrajectoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a sample. Only mappable `Position` samples are kept; anything else is
    /// dropped and `false` returned.
    pub fn append(&mut self, sample: TelemetrySample) -> bool {
        if sample.kind != SampleKind::Position || !sample.is_mappable() {
            debug!("Dropping unmappable sample '{}'", sample.id);
            return false;
        }
        self.samples.push(sample);
        true
    }

    /// The latest `limit` samples, oldest first.
    pub fn snapshot_for_log(&self, limit: usize) -> &[TelemetrySample] {
        let start = self.samples.len().saturating_sub(limit);
        &self.samples[start..]
    }

    /// Every sample since the last clear, oldest first.
    pub fn snapshot_for_map(&self) -> &[TelemetrySample] {
        &self.samples
    }

    /// Map view under an optional path length policy.
    pub fn snapshot_for_map_capped(&self, limit: Option<usize>) -> &[TelemetrySample] {
        match limit {
            Some(limit) => self.snapshot_for_log(limit),
            None => self.snapshot_for_map(),
        }
    }

    pub fn last(&self) -> Option<&TelemetrySample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
