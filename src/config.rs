//! Application configuration
//!
//! Read from `config.json` in the user's data directory. Every field has a
//! default so a partial (or missing) file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::state::data::ViewportRegion;
use crate::state::search::DEFAULT_MIN_QUERY_CHARS;

const APP_DIR: &str = "water-map";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine user data directory")]
    NoDataDir,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where the map starts before anything is selected
    pub start_location: ViewportRegion,
    /// Queries must be longer than this to get suggestions
    pub min_query_chars: usize,
    /// Camera flight time in milliseconds
    pub animation_ms: u64,
    /// Store database, defaults to `<data dir>/water-map/water_map.db`
    pub database_path: Option<PathBuf>,
    /// Uploaded photos, defaults to `<data dir>/water-map/blobs`
    pub blob_dir: Option<PathBuf>,
    /// Address of the signed-in user, needed for comments
    pub user_email: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            start_location: ViewportRegion {
                latitude: 6.9143498,
                longitude: 79.972684,
                latitude_delta: 0.05,
                longitude_delta: 0.0421,
            },
            min_query_chars: DEFAULT_MIN_QUERY_CHARS,
            animation_ms: 1000,
            database_path: None,
            blob_dir: None,
            user_email: None,
        }
    }
}

/// `<data dir>/water-map`
///
/// - Linux: ~/.local/share/water-map
/// - macOS: ~/Library/Application Support/water-map
/// - Windows: %APPDATA%\water-map
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or(ConfigError::NoDataDir)?;
    path.push(APP_DIR);
    Ok(path)
}

impl AppConfig {
    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&app_dir()?.join(CONFIG_FILE))
    }

    /// Load from `path`. A missing file gives the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join("water_map.db")),
        }
    }

    pub fn blob_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.blob_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join("blobs")),
        }
    }
}
