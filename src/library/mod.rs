//! Music library index
//!
//! Built from the playlist file shared with the playback pipeline (one
//! absolute path per line). Every entry carries its precomputed match keys
//! so the resolver never re-normalizes the library per lookup.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::resolver::normalize::{
    display_name, file_name, normalize, split_artist_title, strip_decorations,
};

/// A playable file with its match keys
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub path: PathBuf,
    /// File name without extension, e.g. "Falco - Rock Me Amadeus"
    pub display: String,
    pub artist: Option<String>,
    pub title: String,
    /// Key for the exact tier
    pub normalized: String,
    /// Key for the fuzzy tier
    pub stripped: String,
    pub normalized_artist: Option<String>,
}

impl LibraryEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw = path.to_string_lossy().into_owned();
        let display = display_name(&raw);
        let (artist, title) = match split_artist_title(&raw) {
            Some((artist, title)) => (Some(artist), title),
            None => (None, display.clone()),
        };
        let normalized_artist = artist.as_deref().map(normalize);

        Self {
            normalized: normalize(&raw),
            stripped: strip_decorations(&raw),
            display,
            artist,
            title,
            normalized_artist,
            path,
        }
    }

    /// Path as the string written to the queue and stored in history
    pub fn track_id(&self) -> String {
        self.path.display().to_string()
    }
}

/// Indexed, immutable view of the library
#[derive(Debug, Clone, Default)]
pub struct Library {
    entries: Vec<LibraryEntry>,
    by_normalized: HashMap<String, Vec<usize>>,
    by_file_name: HashMap<String, Vec<usize>>,
    by_artist: HashMap<String, Vec<usize>>,
}

impl Library {
    /// Build from paths, skipping duplicates while keeping first-seen order
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen = HashSet::new();
        let mut library = Self::default();

        for path in paths {
            let path = path.into();
            if !seen.insert(path.clone()) {
                continue;
            }

            let entry = LibraryEntry::new(path);
            let index = library.entries.len();

            library
                .by_normalized
                .entry(entry.normalized.clone())
                .or_default()
                .push(index);
            library
                .by_file_name
                .entry(file_name(&entry.path.to_string_lossy()).to_lowercase())
                .or_default()
                .push(index);
            if let Some(artist) = &entry.normalized_artist {
                library.by_artist.entry(artist.clone()).or_default().push(index);
            }

            library.entries.push(entry);
        }

        library
    }

    /// Load the playlist file; blank lines and `#` comments are ignored
    ///
    /// Relative entries are anchored at the playlist's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(format!("Cannot read library playlist {}", path.display()), e)
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let library = Self::from_paths(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| base.join(line)),
        );

        tracing::info!(
            path = %path.display(),
            tracks = library.len(),
            artists = library.by_artist.len(),
            "Library loaded"
        );
        Ok(library)
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry in playlist order
    pub fn first(&self) -> Option<&LibraryEntry> {
        self.entries.first()
    }

    /// Entry whose exact-tier key equals `normalized`
    pub fn find_exact(&self, normalized: &str) -> Option<&LibraryEntry> {
        self.pick(self.by_normalized.get(normalized))
    }

    /// Entry named by an alias target: full path, then file name, then display name
    pub fn find_target(&self, target: &str) -> Option<&LibraryEntry> {
        let target = target.trim();
        if let Some(entry) = self.entries.iter().find(|e| e.path == Path::new(target)) {
            return Some(entry);
        }
        if let Some(entry) = self.pick(self.by_file_name.get(&file_name(target).to_lowercase())) {
            return Some(entry);
        }
        self.find_exact(&normalize(target))
    }

    /// All entries credited to `normalized_artist`, sorted by path
    pub fn by_artist(&self, normalized_artist: &str) -> Vec<&LibraryEntry> {
        let mut entries: Vec<&LibraryEntry> = self
            .by_artist
            .get(normalized_artist)
            .map(|indices| indices.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Among same-key entries prefer the shortest path, then lexicographic
    fn pick(&self, indices: Option<&Vec<usize>>) -> Option<&LibraryEntry> {
        indices?
            .iter()
            .map(|&i| &self.entries[i])
            .min_by(|a, b| {
                let a_len = a.path.as_os_str().len();
                let b_len = b.path.as_os_str().len();
                a_len.cmp(&b_len).then_with(|| a.path.cmp(&b.path))
            })
    }
}
