//! Content request/response exchanged with the content source

use serde::{Deserialize, Serialize};

/// What the content source needs to know about the show on air
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowContext {
    pub show_id: String,
    pub name: String,
    pub music_style: String,
    pub dj_personality: String,
    /// The show is about to start and should be introduced
    pub introduce: bool,
}

/// Request for the next suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRequest {
    pub last_track: Option<String>,
    pub listener_input: Option<String>,
    /// Steering for retries ("that track was not found, pick another")
    pub instructions: Option<String>,
    pub show_context: ShowContext,
    /// Recently played tracks that must not be suggested
    pub blocklist: Vec<String>,
    pub news: Option<String>,
    pub weather: Option<String>,
}

impl ContentRequest {
    pub fn new(show_context: ShowContext) -> Self {
        Self {
            last_track: None,
            listener_input: None,
            instructions: None,
            show_context,
            blocklist: Vec::new(),
            news: None,
            weather: None,
        }
    }

    /// Same request with different steering instructions
    pub fn with_instructions(&self, instructions: impl Into<String>) -> Self {
        Self {
            instructions: Some(instructions.into()),
            ..self.clone()
        }
    }
}

/// Suggested track plus optional spoken announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentResponse {
    pub track: String,
    #[serde(default)]
    pub announcement: Option<String>,
}

impl ContentResponse {
    pub fn new(track: impl Into<String>) -> Self {
        Self {
            track: track.into(),
            announcement: None,
        }
    }

    pub fn with_announcement(mut self, announcement: impl Into<String>) -> Self {
        self.announcement = Some(announcement.into());
        self
    }

    /// Announcement text if it has any content
    pub fn announcement_text(&self) -> Option<&str> {
        self.announcement
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}
