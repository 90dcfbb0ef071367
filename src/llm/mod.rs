//! LLM content source
//!
//! Asks an Ollama-style `/api/generate` endpoint for the next track and an
//! optional spoken announcement. The model is told to answer with a JSON
//! object; fenced or chatty output is tolerated and the object is extracted
//! before parsing.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::OnceLock;
use std::time::Duration;

use crate::collaborators::{CollaboratorError, ContentRequest, ContentResponse, ContentSource};
use crate::config::StationConfig;
use crate::utils::truncate_text;

const NAME: &str = "llm";

/// Configuration for the LLM client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama endpoint URL (default: http://localhost:11434)
    pub endpoint: String,

    /// Model name to use
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 30,
            max_tokens: 512,
            temperature: 0.8,
        }
    }
}

impl LlmConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `OLLAMA_*` environment variables
    ///
    /// Unparseable numbers are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("OLLAMA_ENDPOINT") {
            self.endpoint = v;
        }
        if let Ok(v) = std::env::var("OLLAMA_MODEL") {
            self.model = v;
        }
        if let Some(v) = std::env::var("OLLAMA_TIMEOUT").ok().and_then(|s| s.parse().ok()) {
            self.timeout_secs = v;
        }
        if let Some(v) = std::env::var("OLLAMA_MAX_TOKENS").ok().and_then(|s| s.parse().ok()) {
            self.max_tokens = v;
        }
        if let Some(v) = std::env::var("OLLAMA_TEMPERATURE").ok().and_then(|s| s.parse().ok()) {
            self.temperature = v;
        }
    }
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama generate response
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    announcement: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Content source backed by a local LLM
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
    station: StationConfig,
}

impl LlmClient {
    /// Create a client for a station
    pub fn new(config: LlmConfig, station: StationConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::failed(NAME, format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            station,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the endpoint answers
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint);
        self.client.get(&url).send().await.is_ok()
    }

    /// Build the prompt for a content request
    fn build_prompt(&self, request: &ContentRequest) -> String {
        let show = &request.show_context;
        let mut prompt = format!(
            "You are {dj}, the DJ of the radio station \"{station}\". \
             Speak {language} in announcements.\n\n\
             Current show: {name}\nMusic style: {style}\nYour personality: {personality}\n",
            dj = self.station.dj_name,
            station = self.station.name,
            language = self.station.language,
            name = show.name,
            style = show.music_style,
            personality = show.dj_personality,
        );

        if show.introduce {
            prompt.push_str(
                "The show is just starting: the announcement must introduce the show.\n",
            );
        }
        if let Some(last) = &request.last_track {
            let _ = writeln!(prompt, "Last played: {last}");
        }
        if !request.blocklist.is_empty() {
            let _ = writeln!(
                prompt,
                "Do NOT suggest any of these recently played tracks: {}",
                request.blocklist.join("; ")
            );
        }
        if let Some(input) = &request.listener_input {
            let _ = writeln!(
                prompt,
                "A listener asked: \"{input}\". Honour the request if it fits the show."
            );
        }
        if let Some(news) = &request.news {
            let _ = writeln!(prompt, "Latest news you may mention briefly: {news}");
        }
        if let Some(weather) = &request.weather {
            let _ = writeln!(prompt, "Weather: {weather}");
        }
        if let Some(instructions) = &request.instructions {
            let _ = writeln!(prompt, "Important: {instructions}");
        }

        prompt.push_str(
            "\nPick the next song. Answer only with JSON:\n\
             {\"track\": \"Artist - Title\", \"announcement\": \"short spoken intro\"}\n",
        );
        prompt
    }

    /// Generate text using Ollama
    async fn generate(&self, prompt: String) -> Result<String, CollaboratorError> {
        let url = format!("{}/api/generate", self.config.endpoint);

        let request = OllamaRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::timeout(NAME, self.config.timeout_secs)
                } else {
                    CollaboratorError::failed(NAME, format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::failed(
                NAME,
                format!("{status} - {}", body.trim()),
            ));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::malformed(NAME, format!("response body: {e}")))?;

        if let Some(error) = ollama_response.error {
            return Err(CollaboratorError::failed(NAME, error));
        }
        Ok(ollama_response.response)
    }
}

#[async_trait]
impl ContentSource for LlmClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn suggest(&self, request: &ContentRequest) -> Result<ContentResponse, CollaboratorError> {
        let prompt = self.build_prompt(request);
        let text = self.generate(prompt).await?;
        parse_suggestion(&text)
    }
}

/// Parse the model output into a response
pub fn parse_suggestion(text: &str) -> Result<ContentResponse, CollaboratorError> {
    let json = extract_json(text);
    tracing::debug!(json = %truncate_text(&json, 300), "Extracted JSON");

    let suggestion = match serde_json::from_str::<Suggestion>(&json) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Suggestion is not valid JSON, scanning fields");
            scan_fields(&json)
        }
    };

    if let Some(error) = suggestion.error.filter(|e| !e.trim().is_empty()) {
        return Err(CollaboratorError::failed(NAME, error));
    }

    let track = suggestion
        .track
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CollaboratorError::malformed(NAME, "missing track"))?;

    Ok(ContentResponse {
        track,
        announcement: suggestion.announcement,
    })
}

/// Extract a JSON object from markdown code blocks or raw text
pub fn extract_json(text: &str) -> String {
    // Try to find JSON in code block
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim().to_string();
        }
    }

    // Generic code block, skipping a language identifier
    if let Some(start) = text.find("```") {
        let after_start = &text[start + 3..];
        let content_start = after_start.find('\n').map_or(0, |i| i + 1);
        if let Some(end) = after_start[content_start..].find("```") {
            return after_start[content_start..content_start + end]
                .trim()
                .to_string();
        }
    }

    // Raw object
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return text[start..=end].to_string();
            }
        }
    }

    text.trim().to_string()
}

/// Pull `track`/`announcement`/`error` out of almost-JSON
fn scan_fields(text: &str) -> Suggestion {
    static FIELD_RE: OnceLock<Regex> = OnceLock::new();
    let re = FIELD_RE.get_or_init(|| {
        Regex::new(r#""(track|announcement|error)"\s*:\s*"((?:[^"\\]|\\.)*)""#)
            .expect("Invalid regex pattern")
    });

    let mut suggestion = Suggestion {
        track: None,
        announcement: None,
        error: None,
    };
    for caps in re.captures_iter(text) {
        let value = caps[2].replace("\\\"", "\"").replace("\\n", " ");
        match &caps[1] {
            "track" => suggestion.track = Some(value),
            "announcement" => suggestion.announcement = Some(value),
            _ => suggestion.error = Some(value),
        }
    }
    suggestion
}
