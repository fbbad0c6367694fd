use std::{
    fs::File,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    HelmsmanError,
    map_overlay::{DEFAULT_ZOOM_LEVEL, MAX_ZOOM_LEVEL, MapComposerConfig},
    session::DEFAULT_LOG_ROWS,
    telemetry::{PollLoopConfig, collector::REFRESH_RATE_MS, store::DEFAULT_FETCH_TIMEOUT_MS},
};

const CONFIG_DIR_NAME: &str = "helmsman";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the Firebase Realtime Database
    pub store_url: Option<String>,
    pub refresh_rate_ms: u64,
    pub fetch_timeout_ms: u64,
    pub log_rows: usize,
    pub map_path_limit: Option<usize>,
    pub zoom_level: u8,
    pub max_zoom: u8,
    pub backoff: bool,
    pub max_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let poll = PollLoopConfig::default();
        Self {
            store_url: None,
            refresh_rate_ms: REFRESH_RATE_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            log_rows: DEFAULT_LOG_ROWS,
            map_path_limit: None,
            zoom_level: DEFAULT_ZOOM_LEVEL,
            max_zoom: MAX_ZOOM_LEVEL,
            backoff: poll.backoff,
            max_backoff_ms: poll.max_backoff_ms,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf, HelmsmanError> {
        Ok(dirs::config_dir()
            .ok_or(HelmsmanError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load the user's config file, `None` when there isn't one yet.
    pub fn from_local_file() -> Result<Option<Self>, HelmsmanError> {
        match dirs::config_dir() {
            Some(dir) => Self::from_path(&dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
            None => {
                warn!("No config directory on this platform, using defaults");
                Ok(None)
            }
        }
    }

    pub fn from_path(config_path: &Path) -> Result<Option<Self>, HelmsmanError> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file =
            File::open(config_path).map_err(|e| HelmsmanError::ConfigIOError { source: e })?;
        let config = serde_json::from_reader(file)
            .map_err(|e| HelmsmanError::ConfigSerializeError { source: e })?;
        info!("Loaded config from {:?}", config_path);
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<(), HelmsmanError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), HelmsmanError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HelmsmanError::ConfigIOError { source: e })?;
        }

        let file = File::create(config_path)
            .map_err(|e| HelmsmanError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| HelmsmanError::ConfigSerializeError { source: e })
    }

    pub fn to_poll_config(&self) -> PollLoopConfig {
        PollLoopConfig {
            interval_ms: self.refresh_rate_ms,
            log_rows: self.log_rows,
            map_path_limit: self.map_path_limit,
            composer: MapComposerConfig {
                zoom_level: self.zoom_level,
                max_zoom: self.max_zoom,
            },
            backoff: self.backoff,
            max_backoff_ms: self.max_backoff_ms,
        }
    }
}
