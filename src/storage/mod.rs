//! Durable state for the orchestrator
//!
//! History and pool rotation state survive restarts as small JSON documents
//! written with a temp-file + rename so a crash never leaves a torn file.
//! Unresolved suggestions go to an append-only JSON-lines wishlist.
//!
//! # Example
//!
//! ```no_run
//! use onair::storage::JsonFile;
//!
//! # fn example() -> Result<(), onair::storage::StorageError> {
//! let store = JsonFile::new("./state/history.json");
//! store.save(&vec!["/music/a.mp3".to_string()])?;
//! let restored: Option<Vec<String>> = store.load()?;
//! # Ok(())
//! # }
//! ```

pub mod wishlist;

pub use wishlist::Wishlist;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the state store
#[derive(Error, Debug)]
pub enum StorageError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File could not be written or renamed into place
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored document is not valid JSON for the expected type
    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    /// Write failures may clear (disk full, NFS hiccup); corrupt data will not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Write { .. })
    }

    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write(path: &Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A JSON document on disk with atomic replacement
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Create a handle; nothing touches the disk until `load`/`save`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored value, `None` when the file does not exist yet
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|e| StorageError::read(&self.path, e))?;
        let reader = BufReader::new(file);
        let value = serde_json::from_reader(reader).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "State loaded");
        Ok(Some(value))
    }

    /// Replace the stored value atomically
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StorageError::write(parent, e))?;
            }
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let file = File::create(&temp_path).map_err(|e| StorageError::write(&temp_path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer
            .flush()
            .map_err(|e| StorageError::write(&temp_path, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| StorageError::write(&temp_path, e))?;

        // Atomic rename
        fs::rename(&temp_path, &self.path).map_err(|e| StorageError::write(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}
