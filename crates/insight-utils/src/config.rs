//! Application directory resolution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the state file location
pub const STATE_FILE_ENV: &str = "MARKET_INSIGHT_STATE";

const APP_DIR_NAME: &str = "market-insight";
const STATE_FILE_NAME: &str = "state.json";

/// Locations used by the application on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDirs {
    /// Directory that holds persisted client state
    pub data_dir: PathBuf,
    /// JSON file backing the key-value store
    pub state_file: PathBuf,
}

impl AppDirs {
    /// Resolve from the platform data directory
    ///
    /// Falls back to the current directory when the platform has no data dir.
    pub fn resolve() -> Self {
        if let Ok(path) = std::env::var(STATE_FILE_ENV) {
            return Self::with_state_file(path);
        }

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        Self::in_dir(data_dir)
    }

    /// Use `dir` as the data directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let data_dir = dir.into();
        let state_file = data_dir.join(STATE_FILE_NAME);
        Self {
            data_dir,
            state_file,
        }
    }

    /// Use an explicit state file; its parent becomes the data directory
    pub fn with_state_file(path: impl Into<PathBuf>) -> Self {
        let state_file = path.into();
        let data_dir = state_file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            data_dir,
            state_file,
        }
    }
}
