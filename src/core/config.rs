// ─── Transfer Configuration ───
// Resolved once at startup and handed to the transfer service. The core never
// reads the settings store directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{TransferError, TransferResult};

const APP_DIR_NAME: &str = "gameshelf";
const SETTINGS_FILE: &str = "transfer_settings.json";
const APP_USER_AGENT: &str = "Gameshelf/0.1.0";

/// Installs at or above this size are exported as their primary executable only.
pub const LARGE_INSTALL_THRESHOLD_BYTES: u64 = 1 << 31;

/// Connect and read timeout applied to every download.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

pub const ENV_SEVEN_ZIP: &str = "GAMESHELF_7Z";
pub const ENV_TEMP_DIR: &str = "GAMESHELF_TEMP_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Explicit 7-Zip binary. `None` searches `PATH`.
    pub seven_zip_path: Option<PathBuf>,
    pub large_install_threshold_bytes: u64,
    pub http_timeout_secs: u64,
    /// Parent of every job's temp directory. `None` uses `<os temp>/gameshelf`.
    pub temp_root: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            seven_zip_path: None,
            large_install_threshold_bytes: LARGE_INSTALL_THRESHOLD_BYTES,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            temp_root: None,
            user_agent: APP_USER_AGENT.to_string(),
        }
    }
}

impl TransferConfig {
    /// Load from the default settings file, then apply environment overrides.
    pub fn load() -> Self {
        Self::load_from(&default_data_dir().join(SETTINGS_FILE))
            .with_overrides(|key| std::env::var(key).ok())
    }

    /// Missing file yields defaults; a malformed one is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed transfer settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup(ENV_SEVEN_ZIP).filter(|v| !v.trim().is_empty()) {
            self.seven_zip_path = Some(PathBuf::from(binary));
        }
        if let Some(temp) = lookup(ENV_TEMP_DIR).filter(|v| !v.trim().is_empty()) {
            self.temp_root = Some(PathBuf::from(temp));
        }
        self
    }

    pub fn save_to(&self, path: &Path) -> TransferResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(TransferError::io(parent))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TransferError::io(path)(e.into()))?;
        std::fs::write(path, json).map_err(TransferError::io(path))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// The user's downloads folder, falling back to home and then the temp dir.
pub fn download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
}
