//! Text normalisation for track matching
//!
//! Two levels are used:
//!
//! - [`normalize`] for the exact and alias tiers: file name only, audio
//!   extension removed, case folded, whitespace collapsed, and the
//!   artist/title separator written as `" - "`.
//! - [`strip_decorations`] for the fuzzy tier: additionally drops bracketed
//!   metadata, featured-artist credits, release decorations such as
//!   "Remastered 2011" or "Radio Edit", and punctuation.

use regex::Regex;
use std::sync::OnceLock;

use crate::utils::normalize_whitespace;

/// Extensions removed from library file names before comparison
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "m4a", "aac", "wav"];

/// Final path component, accepting either separator
pub fn file_name(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
}

/// Remove a known audio extension, case-insensitively
pub fn strip_audio_extension(name: &str) -> &str {
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if !stem.is_empty() && AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)) {
            return stem;
        }
    }
    name
}

/// Human-readable name of a library path or suggestion ("Artist - Title")
pub fn display_name(text: &str) -> String {
    normalize_whitespace(strip_audio_extension(file_name(text)))
}

fn separator_re() -> &'static Regex {
    static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
    SEPARATOR_RE.get_or_init(|| Regex::new(r"\s+[-–—]+\s+").expect("Invalid regex pattern"))
}

/// Normalized form used by the exact and alias tiers
pub fn normalize(text: &str) -> String {
    let display = display_name(text).to_lowercase();
    separator_re().replace_all(&display, " - ").to_string()
}

/// Split "Artist - Title" into its parts
///
/// A spaced separator wins; otherwise the first unspaced dash is used, so
/// "Jay-Z - Song" yields "Jay-Z" while "Artist-Title" still splits.
pub fn split_artist_title(text: &str) -> Option<(String, String)> {
    static LOOSE_RE: OnceLock<Regex> = OnceLock::new();

    let display = display_name(text);

    let (artist, title) = match separator_re().find(&display) {
        Some(m) => (&display[..m.start()], &display[m.end()..]),
        None => {
            let re = LOOSE_RE
                .get_or_init(|| Regex::new(r"^(.+?)\s*[-–—]\s*(.+)$").expect("Invalid regex pattern"));
            let caps = re.captures(&display)?;
            let artist = caps.get(1)?.as_str();
            let title = caps.get(2)?.as_str();
            (artist, title)
        }
    };

    let artist = artist.trim();
    let title = title.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist.to_string(), title.to_string()))
}

/// Artist part of a suggestion, normalized; `None` when no artist is credited
pub fn normalized_artist(text: &str) -> Option<String> {
    split_artist_title(text).map(|(artist, _)| normalize(&artist))
}

/// Reduced form used by the fuzzy tier
pub fn strip_decorations(text: &str) -> String {
    static BRACKET_RE: OnceLock<Regex> = OnceLock::new();
    static FEAT_RE: OnceLock<Regex> = OnceLock::new();
    static DECORATION_RE: OnceLock<Regex> = OnceLock::new();
    static PUNCT_RE: OnceLock<Regex> = OnceLock::new();

    let bracket_re = BRACKET_RE
        .get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]|\{[^}]*\}").expect("Invalid regex pattern"));
    let feat_re = FEAT_RE.get_or_init(|| {
        Regex::new(r"\s(?:feat\.?|ft\.?|featuring)\s").expect("Invalid regex pattern")
    });
    let decoration_re = DECORATION_RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            \b(?:\d{4}\s+)?(?:digital(?:ly)?\s+)?remaster(?:ed)?(?:\s+version)?(?:\s+\d{4})?\b
            | \bradio\s+(?:edit|version|mix)\b
            | \b(?:single|album|extended|original|mono|stereo)\s+(?:version|mix|edit)\b
            | \bofficial\s+(?:music\s+)?(?:video|audio)\b
            | \blyrics?\s+video\b
            | \blive\s+(?:at|from|in)\b.*$
            | ^live$
            ",
        )
        .expect("Invalid regex pattern")
    });
    let punct_re =
        PUNCT_RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("Invalid regex pattern"));

    let lowered = normalize(text);
    let without_brackets = bracket_re.replace_all(&lowered, " ");

    let mut parts = Vec::new();
    for (index, segment) in without_brackets.split(" - ").enumerate() {
        let segment = segment.trim();
        let segment = match feat_re.find(segment) {
            Some(m) => &segment[..m.start()],
            None => segment,
        };
        let cleaned = decoration_re.replace_all(segment.trim(), " ");
        let cleaned = normalize_whitespace(&cleaned);
        if cleaned.is_empty() && index > 0 {
            continue;
        }
        parts.push(cleaned);
    }

    let joined = parts.join(" ");
    normalize_whitespace(&punct_re.replace_all(&joined, ""))
}
