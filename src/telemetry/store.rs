use std::{path::Path, time::Duration};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::HelmsmanError;

/// Node holding the session counter and stream metadata.
pub const INFO_NODE: &str = "info";
/// Session folders are named with this prefix followed by the zero-padded counter.
pub const FOLDER_PREFIX: &str = "gps-points";

pub(crate) const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Contents of the `info` node.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreInfo {
    /// Current session counter
    pub counter: i64,
    /// Live stream video id
    pub link: String,
    /// Name of the course the vessel is running
    pub arena: String,
}

impl StoreInfo {
    /// Read the `info` node. A missing or non-integer counter is a soft failure.
    pub fn from_value(node: &Value) -> Result<Self, HelmsmanError> {
        let missing_counter = || HelmsmanError::MissingCounter {
            node: INFO_NODE.to_string(),
        };

        let counter = match node.get("counter") {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(missing_counter)?,
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| missing_counter())?,
            _ => return Err(missing_counter()),
        };
        let text = |field: &str| {
            node.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            counter,
            link: text("link"),
            arena: text("arena"),
        })
    }
}

/// Name of the session folder for a counter value, e.g. `gps-points04`.
pub fn folder_id(counter: i64) -> String {
    format!("{}{:02}", FOLDER_PREFIX, counter)
}

/// A read-only source of vessel telemetry.
///
/// The store is organised as an `info` node carrying the session counter and one
/// folder per session holding the latest record of every tracked object. The poll
/// loop reads the counter first and then the folder it points to.
///
/// # Lifecycle
///
/// 1. Call `start()` once to verify the store can be reached
/// 2. Call `info()` at the start of every poll cycle
/// 3. Call `folder()` with the folder id derived from the counter
pub trait TelemetryStore {
    /// Establish that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `StoreConnectionFailed` when the store cannot be reached at all. This
    /// is the only fatal error of the pipeline.
    fn start(&mut self) -> Result<(), HelmsmanError>;

    /// Read the `info` node for the current cycle.
    ///
    /// # Errors
    ///
    /// Soft errors (`MissingCounter`, network failures) are retried by the caller on
    /// the next tick. `StoreExhausted` is returned by finite stores once they have
    /// nothing left to replay.
    fn info(&mut self) -> Result<StoreInfo, HelmsmanError>;

    /// Read a whole session folder.
    ///
    /// # Errors
    ///
    /// Returns `EmptyFolder` when the folder does not exist or holds no records.
    fn folder(&mut self, folder_id: &str) -> Result<Map<String, Value>, HelmsmanError>;

    /// Human-readable description of the store for logging.
    fn describe(&self) -> String;
}

fn folder_from_value(folder_id: &str, value: Option<Value>) -> Result<Map<String, Value>, HelmsmanError> {
    match value {
        Some(Value::Object(records)) if !records.is_empty() => Ok(records),
        _ => Err(HelmsmanError::EmptyFolder {
            folder: folder_id.to_string(),
        }),
    }
}

/// Firebase Realtime Database store, read through its REST interface.
pub struct FirebaseStore {
    base_url: String,
    agent: ureq::Agent,
}

impl FirebaseStore {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn node_url(&self, node: &str) -> String {
        format!("{}/{}.json", self.base_url, node)
    }

    fn get_node(&self, node: &str) -> Result<Value, HelmsmanError> {
        let url = self.node_url(node);
        debug!("GET {}", url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| HelmsmanError::NetworkFailure {
                url: url.clone(),
                source: Box::new(e),
            })?;
        response
            .into_json::<Value>()
            .map_err(|e| HelmsmanError::StoreDecodeError { url, source: e })
    }
}

impl Default for FirebaseStore {
    fn default() -> Self {
        FirebaseStore::new(
            "http://localhost:9000",
            Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        )
    }
}

impl TelemetryStore for FirebaseStore {
    fn start(&mut self) -> Result<(), HelmsmanError> {
        info!("Connecting to telemetry store at {}", self.base_url);
        match self.get_node(INFO_NODE) {
            Ok(_) => {
                info!("Telemetry store reachable");
                Ok(())
            }
            Err(HelmsmanError::NetworkFailure { url, source }) => {
                error!("Telemetry store unreachable: {}", source);
                Err(HelmsmanError::StoreConnectionFailed { url, source })
            }
            Err(e) => Err(e),
        }
    }

    fn info(&mut self) -> Result<StoreInfo, HelmsmanError> {
        StoreInfo::from_value(&self.get_node(INFO_NODE)?)
    }

    fn folder(&mut self, folder_id: &str) -> Result<Map<String, Value>, HelmsmanError> {
        folder_from_value(folder_id, Some(self.get_node(folder_id)?))
    }

    fn describe(&self) -> String {
        format!("firebase:{}", self.base_url)
    }
}

/// An in-memory store replaying whole-database dumps, one per poll cycle.
///
/// Every dump is the JSON object the remote database would return for its root:
/// an `info` node plus the session folders. A `null` dump stands for a cycle in
/// which the store could not be reached. Once every dump has been served the
/// store reports `StoreExhausted`.
pub struct MockStore {
    cur_tick: usize,
    dumps: Vec<Value>,
    current: Option<Value>,
}

impl MockStore {
    pub fn from_dumps(dumps: Vec<Value>) -> Self {
        Self {
            cur_tick: 0,
            dumps,
            current: None,
        }
    }

    /// Load dumps from a JSON Lines file, one database dump per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read or contains a
    /// line that is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self, HelmsmanError> {
        if !path.exists() {
            return Err(HelmsmanError::InvalidReplayFile {
                path: format!("{:?}", path),
            });
        }

        let dumps: Vec<Value> = serde_jsonlines::json_lines(path)
            .map_err(|e| HelmsmanError::ReplayLoaderError { source: e })?
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| HelmsmanError::ReplayLoaderError { source: e })?;

        info!("Loaded {} store dumps from {:?}", dumps.len(), path);
        Ok(Self::from_dumps(dumps))
    }

    pub fn remaining(&self) -> usize {
        self.dumps.len().saturating_sub(self.cur_tick)
    }
}

impl TelemetryStore for MockStore {
    fn start(&mut self) -> Result<(), HelmsmanError> {
        // nothing to connect to
        Ok(())
    }

    fn info(&mut self) -> Result<StoreInfo, HelmsmanError> {
        let dump = self
            .dumps
            .get(self.cur_tick)
            .cloned()
            .ok_or(HelmsmanError::StoreExhausted)?;
        self.cur_tick += 1;

        if dump.is_null() {
            self.current = None;
            return Err(HelmsmanError::StoreUnavailable {
                description: format!("replayed outage at tick {}", self.cur_tick),
            });
        }

        let info = StoreInfo::from_value(dump.get(INFO_NODE).unwrap_or(&Value::Null));
        self.current = Some(dump);
        info
    }

    fn folder(&mut self, folder_id: &str) -> Result<Map<String, Value>, HelmsmanError> {
        let folder = self
            .current
            .as_ref()
            .and_then(|dump| dump.get(folder_id))
            .cloned();
        folder_from_value(folder_id, folder)
    }

    fn describe(&self) -> String {
        format!("replay ({} dumps)", self.dumps.len())
    }
}
