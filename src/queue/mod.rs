//! Queue Manager
//!
//! The orchestrator is the only writer of the queue file and the only
//! clearer of the low-watermark signal; the playback pipeline is the only
//! reader of the queue and the only raiser of the signal. The manager never
//! inspects queue depth itself.
//!
//! Each enqueue is one `write_all` of complete lines on an append-mode
//! handle followed by `sync_data`. A failed append cuts the file back to its
//! previous length before it is retried, so the pipeline never sees half a
//! path or the same batch twice. Lines are absolute paths.

pub mod signal;

pub use signal::{AtomicSignal, FileSignal, LowWatermark};

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::models::QueueItem;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Queue failures
#[derive(Error, Debug)]
pub enum QueueError {
    /// Items could not be appended; they are carried so they are not lost
    #[error("Failed to append {} item(s) to {path}: {source}", .items.len())]
    WriteFailed {
        path: PathBuf,
        items: Vec<String>,
        #[source]
        source: io::Error,
    },

    /// The pipeline resolves queue lines against its own working directory
    #[error("Refusing to queue relative path {path}")]
    RelativePath { path: PathBuf },

    /// Signal could not be cleared
    #[error("Failed to acknowledge low-queue signal: {0}")]
    Signal(#[source] io::Error),
}

impl QueueError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::WriteFailed { source, .. } => !matches!(
                source.kind(),
                io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
            ),
            Self::RelativePath { .. } => false,
            Self::Signal(_) => true,
        }
    }
}

/// Append-only writer for the playback queue plus the low-watermark signal
#[derive(Clone)]
pub struct QueueManager {
    path: PathBuf,
    signal: Arc<dyn LowWatermark>,
    retry: RetryConfig,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("path", &self.path)
            .field("signal_raised", &self.signal.is_raised())
            .finish()
    }
}

impl QueueManager {
    pub fn new(path: impl Into<PathBuf>, signal: Arc<dyn LowWatermark>) -> Self {
        Self {
            path: path.into(),
            signal,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy used for appends
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append several items in order as a single write
    pub async fn enqueue_batch(&self, items: &[QueueItem]) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        if let Some(item) = items.iter().find(|item| item.path.is_relative()) {
            return Err(QueueError::RelativePath {
                path: item.path.clone(),
            });
        }

        let lines: Vec<String> = items.iter().map(QueueItem::queue_line).collect();
        let mut buffer = lines.join("\n");
        buffer.push('\n');

        let result = with_retry_if(
            &self.retry,
            || append(&self.path, buffer.as_bytes()),
            |e: &AppendError| {
                e.rolled_back
                    && !matches!(
                        e.source.kind(),
                        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
                    )
            },
        )
        .await;

        match result {
            Ok(()) => {
                for item in items {
                    tracing::info!(
                        kind = item.kind.as_str(),
                        path = %item.path.display(),
                        "Enqueued"
                    );
                }
                Ok(())
            }
            Err(e) => Err(QueueError::WriteFailed {
                path: self.path.clone(),
                items: lines,
                source: e.source,
            }),
        }
    }

    /// Whether the pipeline has raised the low-queue signal
    pub fn low_watermark_reached(&self) -> bool {
        self.signal.is_raised()
    }

    /// Clear the low-queue signal
    pub fn acknowledge(&self) -> Result<(), QueueError> {
        self.signal.acknowledge().map_err(QueueError::Signal)?;
        tracing::debug!("Low-queue signal acknowledged");
        Ok(())
    }
}

// ============================================================================
// Append with rollback
// ============================================================================

/// A failed append; `rolled_back` means the file is as it was before
#[derive(Error, Debug)]
#[error("{source}")]
struct AppendError {
    source: io::Error,
    rolled_back: bool,
}

impl AppendError {
    fn untouched(source: io::Error) -> Self {
        Self {
            source,
            rolled_back: true,
        }
    }
}

/// File the queue is appended to
#[async_trait]
trait Spool: Send {
    async fn size(&mut self) -> io::Result<u64>;
    async fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    async fn sync(&mut self) -> io::Result<()>;
    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl Spool for File {
    async fn size(&mut self) -> io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes).await
    }

    async fn sync(&mut self) -> io::Result<()> {
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

async fn append(path: &Path, bytes: &[u8]) -> Result<(), AppendError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(AppendError::untouched)?;
    append_to(&mut file, bytes).await
}

/// Write and sync `bytes` at the end of `spool`, cutting it back on failure
async fn append_to<S: Spool>(spool: &mut S, bytes: &[u8]) -> Result<(), AppendError> {
    let start = spool.size().await.map_err(AppendError::untouched)?;

    let written = match spool.write_bytes(bytes).await {
        Ok(()) => spool.sync().await,
        Err(e) => Err(e),
    };
    let Err(source) = written else {
        return Ok(());
    };

    match spool.truncate(start).await {
        Ok(()) => Err(AppendError {
            source,
            rolled_back: true,
        }),
        Err(e) => {
            tracing::error!(
                error = %e,
                length = start,
                "Could not cut the queue back after a failed append"
            );
            Err(AppendError {
                source,
                rolled_back: false,
            })
        }
    }
}
