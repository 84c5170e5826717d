use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::base::{ACCESS_KEY, REFRESH_KEY};
use super::TokenStore;
use crate::error::StoreError;
use crate::models::TokenUpdate;

/// Tokens persisted as a small JSON object so they survive restarts.
///
/// The file is re-read on every access, so another process logging in or out
/// is picked up without coordination.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<config dir>/fleetops/tokens.json`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fleetops")
            .join("tokens.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, err: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Serde {
                message: e.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serde {
            message: e.to_string(),
        })?;
        // Write then rename so a crash never leaves half a file behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn get(&self, key: &str) -> String {
        match self.load() {
            Ok(entries) => entries.get(key).cloned().unwrap_or_default(),
            Err(e) => {
                warn!("Treating unreadable token file as empty: {}", e);
                String::new()
            }
        }
    }
}

impl TokenStore for FileTokenStore {
    fn access(&self) -> String {
        self.get(ACCESS_KEY)
    }

    fn refresh(&self) -> String {
        self.get(REFRESH_KEY)
    }

    fn set(&self, update: TokenUpdate) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load().unwrap_or_default();
        if let Some(access) = update.access {
            entries.insert(ACCESS_KEY.to_string(), access);
        }
        if let Some(refresh) = update.refresh {
            entries.insert(REFRESH_KEY.to_string(), refresh);
        }
        self.save(&entries)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed token file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
