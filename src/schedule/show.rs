//! Show definitions and schedule loading/validation
//!
//! File format (JSON):
//!
//! ```json
//! {
//!   "defaults": { "name": "Freeform", "music_style": "...", "pools": ["general"] },
//!   "shows": [
//!     { "id": "morning", "name": "Morning Drive", "start": "06:00", "end": "10:00",
//!       "music_style": "upbeat pop", "dj_personality": "cheerful",
//!       "pools": ["morning"], "signation": "/jingles/morning.mp3", "news_enabled": true }
//!   ]
//! }
//! ```
//!
//! `end <= start` denotes an overnight show; `"00:00"` or `"24:00"` as end
//! means midnight.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::error::{ScheduleError, ScheduleResult};

/// Minutes in a day
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Id of the show covering gaps in the schedule
pub const DEFAULT_SHOW_ID: &str = "default";

/// A show with its daily time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Show {
    pub id: String,
    pub name: String,
    /// Minute of day the show starts, `0..1440`
    pub start: u16,
    /// Minute of day the show ends, `1..=1440`; below `start` for overnight shows
    pub end: u16,
    pub music_style: String,
    pub dj_personality: String,
    pub pool_refs: Vec<String>,
    pub signation: Option<PathBuf>,
    pub news_enabled: bool,
}

impl Show {
    /// True when the window wraps past midnight
    pub fn is_overnight(&self) -> bool {
        self.end <= self.start
    }

    /// Whether the show is on air at `minute` of the day
    pub fn contains_minute(&self, minute: u16) -> bool {
        if self.is_overnight() {
            minute >= self.start || minute < self.end
        } else {
            minute >= self.start && minute < self.end
        }
    }

    /// Non-wrapping `[from, to)` minute ranges covered by the show
    fn segments(&self) -> Vec<(u16, u16)> {
        if self.is_overnight() {
            let mut segments = vec![(self.start, MINUTES_PER_DAY)];
            if self.end > 0 {
                segments.push((0, self.end));
            }
            segments
        } else {
            vec![(self.start, self.end)]
        }
    }

    /// Whether this is the gap-filling default show
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_SHOW_ID
    }
}

/// Parse "HH:MM" into a minute of day; "24:00" yields 1440
pub fn parse_time(value: &str) -> Option<u16> {
    let (hours, minutes) = value.trim().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;

    match (hours, minutes) {
        (24, 0) => Some(MINUTES_PER_DAY),
        (0..=23, 0..=59) => Some(hours * 60 + minutes),
        _ => None,
    }
}

/// Format a minute of day as "HH:MM"
pub fn format_minute(minute: u16) -> String {
    format!("{:02}:{:02}", (minute / 60) % 24, minute % 60)
}

// ============================================================================
// Raw file format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawSchedule {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    shows: Vec<RawShow>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawDefaults {
    name: String,
    music_style: String,
    dj_personality: String,
    pools: Vec<String>,
    signation: Option<PathBuf>,
    news_enabled: bool,
}

impl Default for RawDefaults {
    fn default() -> Self {
        Self {
            name: "Freeform".to_string(),
            music_style: "a varied mix of popular music".to_string(),
            dj_personality: "friendly and relaxed".to_string(),
            pools: vec![DEFAULT_SHOW_ID.to_string()],
            signation: None,
            news_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawShow {
    #[serde(default)]
    id: Option<String>,
    name: String,
    start: String,
    end: String,
    #[serde(default)]
    music_style: Option<String>,
    #[serde(default)]
    dj_personality: Option<String>,
    #[serde(default)]
    pools: Vec<String>,
    #[serde(default)]
    signation: Option<PathBuf>,
    #[serde(default)]
    news_enabled: bool,
}

/// Derive an id from a show name: lowercase words joined by underscores
fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================================
// Schedule
// ============================================================================

/// Validated, immutable show table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    default_show: Show,
    /// Ordered by start time
    shows: Vec<Show>,
}

impl Schedule {
    /// Schedule with only the freeform default show
    pub fn defaults_only() -> Self {
        Self {
            default_show: default_show(RawDefaults::default()),
            shows: Vec::new(),
        }
    }

    /// Parse and validate a schedule document
    pub fn from_json_str(json: &str, origin: &Path) -> ScheduleResult<Self> {
        let raw: RawSchedule = serde_json::from_str(json).map_err(|source| ScheduleError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw)
    }

    /// Load from a file; a missing file yields the defaults-only schedule
    pub fn load(path: &Path) -> ScheduleResult<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Schedule file not found, running the freeform show all day"
            );
            return Ok(Self::defaults_only());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut schedule = Self::from_json_str(&content, path)?;
        if let Some(dir) = path.parent() {
            schedule.anchor_signations(dir);
        }
        tracing::info!(path = %path.display(), shows = schedule.shows.len(), "Schedule loaded");
        Ok(schedule)
    }

    /// Resolve relative signation paths against `base`
    pub fn anchor_signations(&mut self, base: &Path) {
        let shows = std::iter::once(&mut self.default_show).chain(self.shows.iter_mut());
        for show in shows {
            if let Some(signation) = show.signation.as_mut().filter(|p| p.is_relative()) {
                *signation = base.join(&*signation);
            }
        }
    }

    fn from_raw(raw: RawSchedule) -> ScheduleResult<Self> {
        let default_show = default_show(raw.defaults);

        let mut shows = Vec::with_capacity(raw.shows.len());
        let mut ids = HashSet::new();
        ids.insert(DEFAULT_SHOW_ID.to_string());

        for raw_show in raw.shows {
            let id = raw_show
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| slug(&raw_show.name));
            if !ids.insert(id.clone()) {
                return Err(ScheduleError::DuplicateId { id });
            }

            let start = parse_time(&raw_show.start)
                .filter(|&m| m < MINUTES_PER_DAY)
                .ok_or_else(|| ScheduleError::invalid_time(&id, &raw_show.start))?;
            let end = match parse_time(&raw_show.end) {
                Some(0) => MINUTES_PER_DAY,
                Some(m) => m,
                None => return Err(ScheduleError::invalid_time(&id, &raw_show.end)),
            };
            if start == end {
                return Err(ScheduleError::EmptyInterval { show: id });
            }

            shows.push(Show {
                name: raw_show.name,
                start,
                end,
                music_style: raw_show
                    .music_style
                    .unwrap_or_else(|| default_show.music_style.clone()),
                dj_personality: raw_show
                    .dj_personality
                    .unwrap_or_else(|| default_show.dj_personality.clone()),
                pool_refs: if raw_show.pools.is_empty() {
                    vec![id.clone()]
                } else {
                    raw_show.pools
                },
                signation: raw_show.signation,
                news_enabled: raw_show.news_enabled,
                id,
            });
        }

        shows.sort_by_key(|s| (s.start, s.end));
        check_overlaps(&shows)?;

        Ok(Self {
            default_show,
            shows,
        })
    }

    /// Configured shows ordered by start time
    pub fn shows(&self) -> &[Show] {
        &self.shows
    }

    /// Show covering unscheduled time
    pub fn default_show(&self) -> &Show {
        &self.default_show
    }

    /// Look a show up by id, including the default show
    pub fn find(&self, id: &str) -> Option<&Show> {
        if id == DEFAULT_SHOW_ID {
            return Some(&self.default_show);
        }
        self.shows.iter().find(|s| s.id == id)
    }

    /// All shows including the default, default first
    pub fn all_shows(&self) -> impl Iterator<Item = &Show> {
        std::iter::once(&self.default_show).chain(self.shows.iter())
    }

    /// Show on air at `minute`, falling back to the default show
    pub fn show_at_minute(&self, minute: u16) -> &Show {
        self.shows
            .iter()
            .find(|s| s.contains_minute(minute))
            .unwrap_or(&self.default_show)
    }
}

fn default_show(defaults: RawDefaults) -> Show {
    Show {
        id: DEFAULT_SHOW_ID.to_string(),
        name: defaults.name,
        start: 0,
        end: MINUTES_PER_DAY,
        music_style: defaults.music_style,
        dj_personality: defaults.dj_personality,
        pool_refs: if defaults.pools.is_empty() {
            vec![DEFAULT_SHOW_ID.to_string()]
        } else {
            defaults.pools
        },
        signation: defaults.signation,
        news_enabled: defaults.news_enabled,
    }
}

fn check_overlaps(shows: &[Show]) -> ScheduleResult<()> {
    for (i, first) in shows.iter().enumerate() {
        for second in &shows[i + 1..] {
            let clash = first.segments().iter().any(|&(a_from, a_to)| {
                second
                    .segments()
                    .iter()
                    .any(|&(b_from, b_to)| a_from < b_to && b_from < a_to)
            });
            if clash {
                return Err(ScheduleError::overlap(&first.id, &second.id));
            }
        }
    }
    Ok(())
}
