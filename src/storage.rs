use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use stopwatch_core::{RecordError, SessionRecord};

const SLOT_NAME: &str = "stopwatch_data_v1";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no data directory available on this platform")]
    NoDataDir,
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A single named slot holding the serialized session.
pub trait SessionStorage {
    fn read(&self) -> Result<Option<String>, StorageError>;
    fn write(&self, payload: &str) -> Result<(), StorageError>;
    /// Removing an empty slot is not an error.
    fn remove(&self) -> Result<(), StorageError>;
}

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The slot inside the platform data directory.
    pub fn in_data_dir() -> Result<Self, StorageError> {
        let dirs = directories::ProjectDirs::from("", "", "stopwatch").ok_or(StorageError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join(format!("{}.json", SLOT_NAME))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io { path: self.path.clone(), source }
    }
}

impl SessionStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, payload: &str) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        // Write a sibling and rename over the slot so a crash never leaves half a record.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn remove(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Load the saved session. Anything unreadable is logged and discarded.
pub fn load_session(storage: &dyn SessionStorage) -> Option<SessionRecord> {
    let payload = match storage.read() {
        Ok(Some(payload)) => payload,
        Ok(None) => return None,
        Err(e) => {
            log::error!("Failed to read saved session: {}", e);
            clear_session(storage);
            return None;
        }
    };
    match SessionRecord::decode(&payload) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Discarding saved session: {}", e);
            clear_session(storage);
            None
        }
    }
}

pub fn save_session(storage: &dyn SessionStorage, record: &SessionRecord) -> Result<(), StorageError> {
    let payload = record.encode()?;
    storage.write(&payload)
}

pub fn clear_session(storage: &dyn SessionStorage) {
    if let Err(e) = storage.remove() {
        log::error!("Failed to clear saved session: {}", e);
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;
