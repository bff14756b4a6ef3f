//! File system paths for the background process.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Durable key-value store filename under the base directory.
const STORE_FILE_NAME: &str = "storage.json";
/// Installation identity filename under the base directory.
const INSTALLATION_ID_FILE_NAME: &str = "installation_id";
/// Central JSONL log filename under the logs directory.
const LOG_FILE_NAME: &str = "companion.jsonl";

/// Manages file system paths for the background process.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.companion)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.companion`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".companion"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.companion).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.companion/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the durable store path (~/.companion/storage.json).
    pub fn store_file(&self) -> PathBuf {
        self.base_dir.join(STORE_FILE_NAME)
    }

    /// Get the installation identity path (~/.companion/installation_id).
    pub fn installation_id_file(&self) -> PathBuf {
        self.base_dir.join(INSTALLATION_ID_FILE_NAME)
    }

    /// Get the logs directory (~/.companion/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the central log file path (~/.companion/logs/companion.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
