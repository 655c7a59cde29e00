//! Durable user preferences (a small string key/value store).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StorageError;

/// Key holding the selected city.
pub const CITY_KEY: &str = "cityName";

const PREFS_FILE: &str = "preferences.json";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Preferences kept as a JSON object in `<config_dir>/preferences.json`.
pub struct FilePreferenceStore {
    path: PathBuf,
    // Serializes read-modify-write of the file.
    lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(PREFS_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| StorageError::Corruption(format!("{}: {}", self.path.display(), e)))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut prefs = match self.read_all() {
            Ok(prefs) => prefs,
            Err(StorageError::Corruption(detail)) => {
                tracing::warn!("Resetting corrupted preferences: {}", detail);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        prefs.insert(key.to_string(), value.to_string());

        let write_err = |e: std::io::Error| {
            StorageError::WriteFailed(format!("{}: {}", self.path.display(), e))
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&prefs)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        fs::write(&self.path, json).map_err(write_err)?;

        tracing::debug!("Saved preference {}", key);
        Ok(())
    }
}

/// In-process store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Saved city, or `fallback` when nothing usable is stored.
///
/// Read failures are logged and treated as "nothing stored".
pub fn load_city(store: &dyn PreferenceStore, fallback: &str) -> String {
    match store.get(CITY_KEY) {
        Ok(Some(city)) if !city.trim().is_empty() => city,
        Ok(_) => fallback.to_string(),
        Err(e) => {
            tracing::warn!("Could not read saved city: {}", e);
            fallback.to_string()
        }
    }
}

pub fn save_city(store: &dyn PreferenceStore, city_name: &str) -> Result<(), StorageError> {
    store.set(CITY_KEY, city_name)
}
