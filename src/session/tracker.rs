use log::info;
use serde::{Deserialize, Serialize};

use crate::telemetry::store::folder_id;

/// Result of observing a counter value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub folder_id: String,
    pub did_rollover: bool,
}

/// Tracks the session epoch advertised by the store counter.
///
/// The first observation is the baseline and never a rollover. Every later
/// observation whose folder differs from the previous one is.
#[derive(Clone, Debug, Default)]
pub struct SessionTracker {
    counter: Option<i64>,
    folder_id: Option<String>,
    previous_folder_id: Option<String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, counter: i64) -> Observation {
        let folder_id = folder_id(counter);
        let did_rollover = self
            .folder_id
            .as_ref()
            .is_some_and(|current| *current != folder_id);

        if did_rollover {
            info!(
                "Session rollover: {} -> {}",
                self.folder_id.as_deref().unwrap_or("-"),
                folder_id
            );
        }

        self.previous_folder_id = self.folder_id.replace(folder_id.clone());
        self.counter = Some(counter);

        Observation {
            folder_id,
            did_rollover,
        }
    }

    pub fn counter(&self) -> Option<i64> {
        self.counter
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref()
    }

    pub fn previous_folder_id(&self) -> Option<&str> {
        self.previous_folder_id.as_deref()
    }
}
