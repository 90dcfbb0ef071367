//! Audience signals: listener count from the streaming server, listener requests

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CollaboratorError, ListenerProbe, RequestInbox};
use crate::models::ListenerRequest;
use crate::utils::normalize_whitespace;

/// Reads `icestats.source.listeners` from an Icecast `status-json.xsl`
#[derive(Debug, Clone)]
pub struct IcecastProbe {
    client: reqwest::Client,
    status_url: String,
}

impl IcecastProbe {
    pub fn new(status_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::failed("listeners", e.to_string()))?;

        Ok(Self {
            client,
            status_url: status_url.into(),
        })
    }
}

/// Sum listeners over one source or an array of sources
pub fn parse_listener_count(status: &Value) -> Option<u32> {
    let source = status.get("icestats")?.get("source")?;
    let count_of = |s: &Value| -> u64 {
        match s.get("listeners") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
            _ => 0,
        }
    };

    let total = match source {
        Value::Array(sources) => sources.iter().map(count_of).sum(),
        Value::Object(_) => count_of(source),
        _ => return None,
    };
    Some(u32::try_from(total).unwrap_or(u32::MAX))
}

#[async_trait]
impl ListenerProbe for IcecastProbe {
    async fn listener_count(&self) -> Result<u32, CollaboratorError> {
        let response = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .map_err(|e| CollaboratorError::failed("listeners", e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::failed(
                "listeners",
                format!("HTTP {}", response.status()),
            ));
        }

        let status: Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::malformed("listeners", e.to_string()))?;

        parse_listener_count(&status)
            .ok_or_else(|| CollaboratorError::malformed("listeners", "no icestats.source in status"))
    }
}

/// Request left as a text file by the listener-facing server
#[derive(Debug, Clone)]
pub struct FileRequestInbox {
    path: PathBuf,
}

impl FileRequestInbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RequestInbox for FileRequestInbox {
    async fn take(&self) -> Result<Option<ListenerRequest>, CollaboratorError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CollaboratorError::failed("inbox", e.to_string())),
        };

        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|e| CollaboratorError::failed("inbox", e.to_string()))?;

        let text = normalize_whitespace(&content);
        if text.is_empty() {
            return Ok(None);
        }

        tracing::info!(request = %text, "Listener request received");
        Ok(Some(ListenerRequest {
            text,
            received_at: Local::now(),
        }))
    }
}
