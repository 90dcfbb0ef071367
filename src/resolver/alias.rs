//! Alias table: hand-maintained corrections from suggestion text to library tracks

use std::collections::HashMap;
use std::path::Path;

use super::normalize::normalize;
use crate::error::{Error, Result};

/// Read-only many-to-one correction table
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Normalized suggestion text -> library path or file name
    entries: HashMap<String, String>,
}

impl AliasTable {
    /// Build from raw `suggestion -> target` pairs
    ///
    /// Keys are normalized so lookups ignore case and spacing. When two raw
    /// keys normalize to the same text the later one wins.
    pub fn from_map(raw: HashMap<String, String>) -> Self {
        let mut pairs: Vec<(String, String)> = raw.into_iter().collect();
        pairs.sort();

        let entries = pairs
            .into_iter()
            .filter(|(key, target)| !key.trim().is_empty() && !target.trim().is_empty())
            .map(|(key, target)| (normalize(&key), target.trim().to_string()))
            .collect();
        Self { entries }
    }

    /// Load a JSON object file; a missing file is an empty table
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No alias file, using empty table");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| Error::with_source(format!("Invalid alias file {}", path.display()), e))?;

        let table = Self::from_map(raw);
        tracing::info!(path = %path.display(), aliases = table.len(), "Alias table loaded");
        Ok(table)
    }

    /// Target for a suggestion, if one is listed
    pub fn lookup(&self, suggestion: &str) -> Option<&str> {
        self.entries.get(&normalize(suggestion)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
