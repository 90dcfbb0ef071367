//! Append-only log of suggestions the library could not satisfy
//!
//! One JSON object per line so an external review tool can tail it.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::StorageError;
use crate::models::WishlistEntry;

/// Wishlist writer/reader
#[derive(Debug, Clone)]
pub struct Wishlist {
    path: PathBuf,
}

impl Wishlist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single entry
    pub fn append(&self, entry: &WishlistEntry) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.write_error(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.write_error(source))?;

        tracing::info!(
            text = %entry.requested_text,
            source = %entry.source,
            "Added to wishlist"
        );
        Ok(())
    }

    /// Read all entries, skipping lines that do not parse
    pub fn entries(&self) -> Result<Vec<WishlistEntry>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StorageError::Read {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WishlistEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Skipping malformed wishlist line")
                }
            }
        }
        Ok(entries)
    }

    /// The `limit` most recent entries, oldest first
    pub fn tail(&self, limit: usize) -> Result<Vec<WishlistEntry>, StorageError> {
        let mut entries = self.entries()?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    fn write_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
