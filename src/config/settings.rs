//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioMode
// ---------------------------------------------------------------------------

/// Selects which audio sources feed the transcription pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Microphone only.
    MicOnly,
    /// System output (loopback) only.
    SystemOnly,
    /// Microphone and system output blended into one stream.
    Mix,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self::MicOnly
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper transcription stage and the segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Default GGML model name (e.g. `"large-v3-turbo-q8_0"`).
    pub model: String,
    /// Per-locale model overrides, keyed by full locale (`"zh-tw"`) or
    /// primary subtag (`"zh"`).
    #[serde(default)]
    pub models: HashMap<String, String>,
    /// Maximum chunk length in seconds before a recognition call is forced.
    pub chunk_duration: f32,
    /// Seconds of audio carried over from the tail of the previous chunk so
    /// word boundaries spanning chunk edges are not lost.
    pub overlap: f32,
    /// RMS amplitude below which audio counts as silence.
    pub silence_threshold: f32,
    /// Seconds of trailing sub-threshold audio that ends a chunk early.
    pub pause_duration: f32,
}

impl TranscriptionConfig {
    /// Reject segmenter settings the recognizer can never serve.
    ///
    /// A `chunk_duration` past [`MAX_CHUNK_SECS`] would make every chunk fail
    /// with `AudioTooLong` — the session would run but transcribe nothing.
    ///
    /// [`MAX_CHUNK_SECS`]: crate::stt::MAX_CHUNK_SECS
    pub fn validate(&self) -> Result<()> {
        let max = crate::stt::MAX_CHUNK_SECS;
        anyhow::ensure!(
            self.chunk_duration > 0.0 && self.chunk_duration <= max,
            "transcription.chunk_duration must be in (0, {max}] seconds, got {}",
            self.chunk_duration
        );
        anyhow::ensure!(
            self.overlap >= 0.0 && self.overlap < self.chunk_duration,
            "transcription.overlap ({}) must be non-negative and shorter than chunk_duration ({})",
            self.overlap,
            self.chunk_duration
        );
        Ok(())
    }

    /// Resolve the model name for a locale.
    ///
    /// Checks the full key first, then the primary subtag, then falls back
    /// to the default model.
    pub fn model_for_locale(&self, locale: &str) -> &str {
        let key = locale.to_lowercase();
        if let Some(m) = self.models.get(&key) {
            return m;
        }
        if let Some(prefix) = key.split('-').next() {
            if let Some(m) = self.models.get(prefix) {
                return m;
            }
        }
        &self.model
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "large-v3-turbo-q8_0".into(),
            models: HashMap::new(),
            chunk_duration: 25.0,
            overlap: 1.0,
            silence_threshold: 0.01,
            pause_duration: 1.5,
        }
    }
}

// ---------------------------------------------------------------------------
// DigestConfig
// ---------------------------------------------------------------------------

/// Settings for the digest trigger policy and history compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Model identifier used for digest calls.
    pub model: String,
    /// Minimum buffered transcript lines before a digest may trigger.
    pub min_lines: u32,
    /// Minimum seconds since the last digest before one may trigger.
    pub min_interval: f32,
    /// Force-trigger line cap, ignoring elapsed time.  `None` means
    /// `2 × min_lines`.  Bounds worst-case prompt size under rapid speech.
    #[serde(default)]
    pub max_lines: Option<u32>,
    /// Prompt-token count above which the conversation history is compacted.
    pub compact_token_threshold: u64,
}

impl DigestConfig {
    /// Effective force-trigger cap (`max_lines` or `2 × min_lines`).
    pub fn line_cap(&self) -> u32 {
        self.max_lines.unwrap_or(self.min_lines * 2)
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            model: "gpt-oss:120b-cloud".into(),
            min_lines: 15,
            min_interval: 60.0,
            max_lines: None,
            compact_token_threshold: 100_000,
        }
    }
}

// ---------------------------------------------------------------------------
// InteractiveConfig
// ---------------------------------------------------------------------------

/// Settings for quick-action queries (cheaper model than digests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveConfig {
    /// Model identifier used for quick-action queries.
    pub model: String,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            model: "gpt-oss:20b-cloud".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and dead-stream recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Which sources feed the pipeline.
    pub mode: AudioMode,
    /// Seconds of sustained near-zero amplitude (after real signal has been
    /// seen) before the capture stream is torn down and recreated.
    pub silence_recovery_secs: f32,
    /// Maximum stream restart attempts before the source is declared dead.
    pub max_restarts: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mode: AudioMode::default(),
            silence_recovery_secs: 15.0,
            max_restarts: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Connection settings for the OpenAI-compatible LLM backend.
///
/// Works with Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM — any
/// provider that speaks the chat-completions wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the API endpoint (Ollama default: `http://localhost:11434`).
    pub base_url: String,
    /// API key — `None` for local providers that need no authentication.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Maximum seconds to wait for an LLM response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

/// Settings for session output on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Parent directory for timestamped session directories.
    pub directory: String,
    /// Also write the processed 16 kHz audio to `recording.wav`.
    pub save_audio: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./output".into(),
            save_audio: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use talknotes::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transcription / segmenter settings.
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    /// Digest trigger and compaction settings.
    #[serde(default)]
    pub digest: DigestConfig,
    /// Quick-action query settings.
    #[serde(default)]
    pub interactive: InteractiveConfig,
    /// Audio capture / recovery settings.
    #[serde(default)]
    pub audio: AudioConfig,
    /// LLM backend connection settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Session output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Default session template name.
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_template() -> String {
    "default".into()
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.transcription.model, loaded.transcription.model);
        assert_eq!(
            original.transcription.chunk_duration,
            loaded.transcription.chunk_duration
        );
        assert_eq!(original.transcription.overlap, loaded.transcription.overlap);
        assert_eq!(original.digest.model, loaded.digest.model);
        assert_eq!(original.digest.min_lines, loaded.digest.min_lines);
        assert_eq!(original.digest.min_interval, loaded.digest.min_interval);
        assert_eq!(original.digest.max_lines, loaded.digest.max_lines);
        assert_eq!(
            original.digest.compact_token_threshold,
            loaded.digest.compact_token_threshold
        );
        assert_eq!(original.interactive.model, loaded.interactive.model);
        assert_eq!(original.audio.mode, loaded.audio.mode);
        assert_eq!(original.audio.max_restarts, loaded.audio.max_restarts);
        assert_eq!(original.llm.base_url, loaded.llm.base_url);
        assert_eq!(original.llm.api_key, loaded.llm.api_key);
        assert_eq!(original.output.directory, loaded.output.directory);
        assert_eq!(original.template, loaded.template);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn missing_file_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nope.toml");
        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.digest.min_lines, 15);
    }

    // ---- model_for_locale ---------------------------------------------------

    #[test]
    fn model_for_locale_full_key_wins() {
        let mut tc = TranscriptionConfig::default();
        tc.models.insert("zh-tw".into(), "breeze-q8".into());
        tc.models.insert("zh".into(), "other".into());
        assert_eq!(tc.model_for_locale("zh-TW"), "breeze-q8");
    }

    #[test]
    fn model_for_locale_falls_back_to_subtag() {
        let mut tc = TranscriptionConfig::default();
        tc.models.insert("zh".into(), "breeze-q8".into());
        assert_eq!(tc.model_for_locale("zh-CN"), "breeze-q8");
    }

    #[test]
    fn model_for_locale_falls_back_to_default() {
        let tc = TranscriptionConfig::default();
        assert_eq!(tc.model_for_locale("en-US"), tc.model);
    }

    // ---- TranscriptionConfig::validate ---------------------------------------

    #[test]
    fn default_transcription_config_validates() {
        assert!(TranscriptionConfig::default().validate().is_ok());
    }

    #[test]
    fn chunk_duration_past_recognizer_cap_is_rejected() {
        let tc = TranscriptionConfig {
            chunk_duration: 60.0,
            ..TranscriptionConfig::default()
        };
        let err = tc.validate().unwrap_err().to_string();
        assert!(err.contains("chunk_duration"), "unexpected error: {err}");
    }

    #[test]
    fn overlap_must_be_shorter_than_chunk() {
        let tc = TranscriptionConfig {
            chunk_duration: 5.0,
            overlap: 5.0,
            ..TranscriptionConfig::default()
        };
        assert!(tc.validate().is_err());
    }

    // ---- DigestConfig::line_cap --------------------------------------------

    #[test]
    fn line_cap_defaults_to_twice_min_lines() {
        let dc = DigestConfig::default();
        assert_eq!(dc.line_cap(), 30);
    }

    #[test]
    fn line_cap_uses_explicit_max_lines() {
        let dc = DigestConfig {
            max_lines: Some(50),
            ..DigestConfig::default()
        };
        assert_eq!(dc.line_cap(), 50);
    }

    // ---- AudioMode serde ----------------------------------------------------

    #[test]
    fn audio_mode_serialises_snake_case() {
        #[derive(Serialize)]
        struct W {
            mode: AudioMode,
        }
        let s = toml::to_string(&W {
            mode: AudioMode::SystemOnly,
        })
        .unwrap();
        assert!(s.contains("system_only"));
    }
}
