use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::config::default_data_dir;
use crate::core::error::{TransferError, TransferResult};

pub const STORE_FILE: &str = "store.json";

/// Key-value settings the front ends read and write. The transfer core never
/// touches it directly; callers resolve values and pass them in.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> TransferResult<()>;

    /// Stored value, or `default` when the key is unset.
    fn get_or(&self, key: &str, default: Option<Value>) -> Option<Value> {
        self.get(key).or(default)
    }
}

/// A JSON object on disk, cached in memory.
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    pub fn default_location() -> PathBuf {
        default_data_dir().join(STORE_FILE)
    }

    /// Open the store at `path`. A missing file starts empty; a file that is
    /// not a JSON object is discarded.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                _ => {
                    warn!("Discarding invalid settings store at {:?}", path);
                    let _ = std::fs::remove_file(&path);
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Self {
            path,
            values: RwLock::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> TransferResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(TransferError::io(parent))?;
        }

        let json = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(TransferError::io(&tmp))?;
        std::fs::rename(&tmp, &self.path).map_err(TransferError::io(&self.path))?;
        debug!("Saved settings store {:?}", self.path);
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> TransferResult<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        self.persist(&values)
    }
}
