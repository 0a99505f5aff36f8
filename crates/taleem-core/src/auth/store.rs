use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Session store lock was poisoned")]
    Poisoned,
}

/// Fixed keys of the persisted session layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    UserData,
}

impl StoreKey {
    pub const ALL: [StoreKey; 3] = [
        StoreKey::AccessToken,
        StoreKey::RefreshToken,
        StoreKey::UserData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AccessToken => "access_token",
            StoreKey::RefreshToken => "refresh_token",
            StoreKey::UserData => "user_data",
        }
    }
}

/// Process-wide key-value store holding session credentials.
///
/// Implementations are shared between every caller of the API client and
/// must guard their data so concurrent writes never interleave.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError>;

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: StoreKey) -> Result<(), StoreError>;

    /// Remove every session key.
    fn clear(&self) -> Result<(), StoreError> {
        for key in StoreKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and sessions that should not outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(&key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user_data: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl SessionFile {
    fn slot(&mut self, key: StoreKey) -> &mut Option<String> {
        match key {
            StoreKey::AccessToken => &mut self.access_token,
            StoreKey::RefreshToken => &mut self.refresh_token,
            StoreKey::UserData => &mut self.user_data,
        }
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_data.is_none()
    }
}

/// JSON file store surviving restarts, the CLI default.
///
/// Every write rewrites the whole file under a lock through a temp file that
/// is renamed into place. The file is deleted once the last key is removed.
/// `clear` never parses the file, so a damaged session can always be dropped.
pub struct FileStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    fn read(&self) -> Result<SessionFile, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(SessionFile::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, file: &SessionFile) -> Result<(), StoreError> {
        let path = self.path();
        if file.is_empty() {
            return self.remove_file();
        }
        std::fs::create_dir_all(&self.data_dir)?;
        let contents = serde_json::to_string_pretty(file)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.data_dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove_file(&self) -> Result<(), StoreError> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn update<F: FnOnce(&mut SessionFile)>(&self, f: F) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = self.read()?;
        f(&mut file);
        file.updated_at = Some(Utc::now());
        self.write(&file)
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = self.read()?;
        Ok(file.slot(key).take())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.update(|file| *file.slot(key) = Some(value.to_string()))
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        self.update(|file| *file.slot(key) = None)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.remove_file()
    }
}
