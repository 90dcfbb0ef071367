//! Speech synthesis: command-backed voices, rotating output slots, fallback chain

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::command::{run_command, CommandSpec};
use super::{call_with_timeout, CollaboratorError, SpeechSynthesizer};

/// Rotating set of announcement files
///
/// A slot is reused only once its audio is older than `min_age`, so a
/// segment still waiting in the queue is not overwritten. When every slot is
/// younger the oldest one is taken.
#[derive(Debug, Clone)]
pub struct AnnouncementSlots {
    dir: PathBuf,
    count: usize,
    min_age: Duration,
}

impl AnnouncementSlots {
    pub fn new(dir: impl Into<PathBuf>, count: usize, min_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            count: count.max(1),
            min_age,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Audio path of a slot (1-based)
    pub fn audio_path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("announcement{slot}.mp3"))
    }

    /// Text path of a slot (1-based)
    pub fn text_path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("announcement{slot}.txt"))
    }

    /// Pick the slot for the next announcement
    pub fn next_slot(&self) -> usize {
        let now = SystemTime::now();
        let mut oldest: Option<(usize, Duration)> = None;

        for slot in 1..=self.count {
            let age = match std::fs::metadata(self.audio_path(slot)).and_then(|m| m.modified()) {
                Ok(modified) => now.duration_since(modified).unwrap_or_default(),
                Err(_) => return slot,
            };
            if age >= self.min_age {
                return slot;
            }
            if oldest.map_or(true, |(_, oldest_age)| age > oldest_age) {
                oldest = Some((slot, age));
            }
        }

        let (slot, age) = oldest.unwrap_or((1, Duration::ZERO));
        tracing::warn!(
            slot,
            age_secs = age.as_secs(),
            min_age_secs = self.min_age.as_secs(),
            "All announcement slots are recent, reusing the oldest"
        );
        slot
    }
}

/// A voice driven by an external command
///
/// The command receives `{text_file}`, `{output}`, `{language}` and `{text}`
/// placeholders and must write the audio to `{output}`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    name: String,
    spec: CommandSpec,
    slots: Arc<AnnouncementSlots>,
    timeout: Duration,
}

impl CommandSynthesizer {
    pub fn new(
        name: impl Into<String>,
        spec: CommandSpec,
        slots: Arc<AnnouncementSlots>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            slots,
            timeout,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<PathBuf, CollaboratorError> {
        let slot = self.slots.next_slot();
        let text_path = self.slots.text_path(slot);
        let audio_path = self.slots.audio_path(slot);

        tokio::fs::create_dir_all(self.slots.dir())
            .await
            .map_err(|e| CollaboratorError::failed(&self.name, format!("slot dir: {e}")))?;
        tokio::fs::write(&text_path, text)
            .await
            .map_err(|e| CollaboratorError::failed(&self.name, format!("text file: {e}")))?;
        // the voice has to write fresh audio into the slot
        match tokio::fs::remove_file(&audio_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CollaboratorError::failed(
                    &self.name,
                    format!("stale slot {}: {e}", audio_path.display()),
                ))
            }
        }

        let text_arg = text_path.display().to_string();
        let output_arg = audio_path.display().to_string();
        let result = run_command(
            &self.name,
            &self.spec,
            &[
                ("text_file", text_arg.as_str()),
                ("output", output_arg.as_str()),
                ("language", language),
                ("text", text),
            ],
            self.timeout,
        )
        .await;

        if let Err(e) = tokio::fs::remove_file(&text_path).await {
            tracing::debug!(path = %text_path.display(), error = %e, "Could not remove text file");
        }
        result?;

        match tokio::fs::metadata(&audio_path).await {
            Ok(meta) if meta.len() > 0 => {
                tracing::info!(voice = %self.name, slot, path = %audio_path.display(), "Announcement rendered");
                Ok(audio_path)
            }
            _ => Err(CollaboratorError::malformed(
                &self.name,
                format!("no audio written to {}", audio_path.display()),
            )),
        }
    }
}

/// Primary voice with a local fallback voice
pub struct FallbackSynthesizer {
    primary: Arc<dyn SpeechSynthesizer>,
    fallback: Option<Arc<dyn SpeechSynthesizer>>,
    timeout: Duration,
}

impl FallbackSynthesizer {
    /// Each voice gets `timeout` on its own
    pub fn new(
        primary: Arc<dyn SpeechSynthesizer>,
        fallback: Option<Arc<dyn SpeechSynthesizer>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FallbackSynthesizer {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<PathBuf, CollaboratorError> {
        let primary = call_with_timeout(
            self.primary.name(),
            self.timeout,
            self.primary.synthesize(text, language),
        )
        .await;

        let primary_err = match primary {
            Ok(path) => return Ok(path),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_err);
        };

        tracing::warn!(
            voice = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_err,
            "Primary voice failed, using fallback voice"
        );
        call_with_timeout(fallback.name(), self.timeout, fallback.synthesize(text, language)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Scripted {
        name: &'static str,
        result: Result<PathBuf, CollaboratorError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, result: Result<PathBuf, CollaboratorError>) -> Self {
            Self {
                name,
                result,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn synthesize(&self, _text: &str, _language: &str) -> Result<PathBuf, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    #[test]
    fn test_next_slot_prefers_missing_then_oldest() {
        let dir = TempDir::new().unwrap();
        let slots = AnnouncementSlots::new(dir.path(), 3, Duration::from_secs(1800));

        assert_eq!(slots.next_slot(), 1);
        std::fs::write(slots.audio_path(1), b"x").unwrap();
        assert_eq!(slots.next_slot(), 2);
        std::fs::write(slots.audio_path(2), b"x").unwrap();
        std::fs::write(slots.audio_path(3), b"x").unwrap();

        // all fresh: one of them is reused rather than failing
        let slot = slots.next_slot();
        assert!((1..=3).contains(&slot));
    }

    #[test]
    fn test_old_slot_is_reused() {
        let dir = TempDir::new().unwrap();
        let slots = AnnouncementSlots::new(dir.path(), 2, Duration::ZERO);
        std::fs::write(slots.audio_path(1), b"x").unwrap();
        assert_eq!(slots.next_slot(), 1);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let primary = Arc::new(Scripted::new(
            "cloud",
            Err(CollaboratorError::failed("cloud", "503")),
        ));
        let fallback = Arc::new(Scripted::new("local", Ok(PathBuf::from("/tts/local.mp3"))));

        let voice = FallbackSynthesizer::new(primary.clone(), Some(fallback.clone()), Duration::from_secs(1));
        let path = voice.synthesize("Hello", "en").await.unwrap();

        assert_eq!(path, PathBuf::from("/tts/local.mp3"));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_primary_timeout_triggers_fallback() {
        let mut slow = Scripted::new("cloud", Ok(PathBuf::from("/tts/cloud.mp3")));
        slow.delay = Duration::from_secs(5);
        let fallback = Arc::new(Scripted::new("local", Ok(PathBuf::from("/tts/local.mp3"))));

        let voice = FallbackSynthesizer::new(Arc::new(slow), Some(fallback), Duration::from_millis(20));
        assert_eq!(
            voice.synthesize("Hello", "en").await.unwrap(),
            PathBuf::from("/tts/local.mp3")
        );
    }

    #[tokio::test]
    async fn test_both_voices_fail() {
        let primary = Arc::new(Scripted::new("cloud", Err(CollaboratorError::failed("cloud", "down"))));
        let fallback = Arc::new(Scripted::new("local", Err(CollaboratorError::failed("local", "down"))));

        let voice = FallbackSynthesizer::new(primary, Some(fallback), Duration::from_secs(1));
        let err = voice.synthesize("Hello", "en").await.unwrap_err();
        assert_eq!(err.name(), "local");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_synthesizer_writes_slot() {
        let dir = TempDir::new().unwrap();
        let slots = Arc::new(AnnouncementSlots::new(dir.path().join("tts"), 2, Duration::from_secs(60)));
        let spec = CommandSpec::new(
            "sh",
            vec!["-c".to_string(), "cat {text_file} > {output}".to_string()],
        );
        let voice = CommandSynthesizer::new("shell", spec, slots.clone(), Duration::from_secs(5));

        let path = voice.synthesize("Good morning", "en").await.unwrap();
        assert_eq!(path, slots.audio_path(1));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Good morning");
        assert!(!slots.text_path(1).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_voice_does_not_reuse_old_audio() {
        let dir = TempDir::new().unwrap();
        let slots = Arc::new(AnnouncementSlots::new(dir.path(), 1, Duration::ZERO));
        std::fs::write(slots.audio_path(1), "YESTERDAY'S ANNOUNCEMENT").unwrap();

        let spec = CommandSpec::new("sh", vec!["-c".to_string(), "true".to_string()]);
        let voice = CommandSynthesizer::new("silent", spec, slots.clone(), Duration::from_secs(5));

        let err = voice.synthesize("Good morning", "en").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed { .. }));
        assert!(!slots.audio_path(1).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_primary_falls_back_to_second_voice() {
        let dir = TempDir::new().unwrap();
        let slots = Arc::new(AnnouncementSlots::new(dir.path(), 1, Duration::ZERO));
        std::fs::write(slots.audio_path(1), "YESTERDAY'S ANNOUNCEMENT").unwrap();

        let silent = CommandSpec::new("sh", vec!["-c".to_string(), "true".to_string()]);
        let local = CommandSpec::new(
            "sh",
            vec!["-c".to_string(), "cat {text_file} > {output}".to_string()],
        );
        let voice = FallbackSynthesizer::new(
            Arc::new(CommandSynthesizer::new("cloud", silent, slots.clone(), Duration::from_secs(5))),
            Some(Arc::new(CommandSynthesizer::new("local", local, slots.clone(), Duration::from_secs(5)))),
            Duration::from_secs(5),
        );

        let path = voice.synthesize("Good morning", "en").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Good morning");
    }
}
