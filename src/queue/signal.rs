//! Low-watermark signal shared with the playback pipeline
//!
//! A single-slot flag: the pipeline raises it when the queue runs low, the
//! orchestrator observes and clears it. Two carriers are provided: an
//! in-process atomic flag and a marker file for the cross-process setup.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-writer/single-reader boolean condition
pub trait LowWatermark: Send + Sync {
    /// Whether the pipeline has asked for more material
    fn is_raised(&self) -> bool;

    /// Clear the condition once the orchestrator has acted on it
    fn acknowledge(&self) -> io::Result<()>;

    /// Raise the condition (pipeline side, or operators and tests)
    fn raise(&self) -> io::Result<()>;
}

/// In-process flag
#[derive(Debug, Default)]
pub struct AtomicSignal {
    raised: AtomicBool,
}

impl AtomicSignal {
    pub fn new(raised: bool) -> Self {
        Self {
            raised: AtomicBool::new(raised),
        }
    }
}

impl LowWatermark for AtomicSignal {
    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    fn acknowledge(&self) -> io::Result<()> {
        self.raised.store(false, Ordering::Release);
        Ok(())
    }

    fn raise(&self) -> io::Result<()> {
        self.raised.store(true, Ordering::Release);
        Ok(())
    }
}

/// Marker file: present means raised
#[derive(Debug, Clone)]
pub struct FileSignal {
    path: PathBuf,
}

impl FileSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LowWatermark for FileSignal {
    fn is_raised(&self) -> bool {
        self.path.exists()
    }

    fn acknowledge(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn raise(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, b"")
    }
}
