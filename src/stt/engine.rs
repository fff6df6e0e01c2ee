//! Recognition port and implementations.
//!
//! # Overview
//!
//! [`Transcriber`] is the interface the pipeline worker calls.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Transcriber>` and invoked from the transcription worker thread.
//!
//! [`WhisperEngine`] is the production implementation wrapping a
//! `whisper_rs::WhisperContext`.  Construct it with [`WhisperEngine::load`].
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) returns scripted
//! segments — useful for testing the pipeline and controller without a GGML
//! model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

// ---------------------------------------------------------------------------
// TranscriptSegment
// ---------------------------------------------------------------------------

/// A single time-aligned line of recognized speech.
///
/// Times are seconds.  As produced by a [`Transcriber`] they are relative to
/// the start of the audio buffer; the segmenter shifts them to absolute
/// session offsets before anything downstream sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Recognized text (may include punctuation inserted by Whisper).
    pub text: String,
    /// Segment start time in seconds.
    pub wall_start: f64,
    /// Segment end time in seconds.
    pub wall_end: f64,
}

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the recognition subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a `WhisperContext` or `WhisperState`.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// The supplied audio buffer is shorter than the minimum 0.5 s
    /// (8 000 samples at 16 kHz).
    #[error("Audio too short — minimum 0.5 s (8 000 samples at 16 kHz)")]
    AudioTooShort,

    /// The supplied audio buffer exceeds the maximum 60 s
    /// (960 000 samples at 16 kHz).
    #[error("Audio too long — maximum 60 s (960 000 samples at 16 kHz)")]
    AudioTooLong,
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech recognizers.
///
/// # Contract
///
/// - `audio` must be **16 kHz, mono, f32** PCM samples.
/// - `prompt` conditions decoding: recognition hints joined with the text of
///   the previous chunk (prompt chaining), or `None` for the first chunk.
/// - Returns `Err(SttError::AudioTooShort)` when `audio.len() < 8_000`.
/// - Returns `Err(SttError::AudioTooLong)` when `audio.len() > 960_000`.
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` and return time-aligned segments.
    fn transcribe(
        &self,
        audio: &[f32],
        prompt: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// Audio length constants (16 kHz mono f32)
// ---------------------------------------------------------------------------

/// Minimum audio length: 0.5 s × 16 000 Hz = 8 000 samples.
pub(crate) const MIN_AUDIO_SAMPLES: usize = 8_000;
/// Maximum audio length: 60 s × 16 000 Hz = 960 000 samples.
const MAX_AUDIO_SAMPLES: usize = 960_000;

/// Longest chunk duration the segmenter may be configured with.  Leaves
/// headroom under the 60 s recognizer cap for the capture loop's read
/// granularity (a chunk may overshoot `chunk_duration` by up to one frame).
pub const MAX_CHUNK_SECS: f32 = 55.0;

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production recognizer that wraps a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created for every [`transcribe`] call so the
/// engine can be shared across threads without any locking.
///
/// [`transcribe`]: Transcriber::transcribe
pub struct WhisperEngine {
    ctx: WhisperContext,
    /// ISO-639-1 language code, or `"auto"` for detection.
    language: String,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("language", &self.language)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send` and `unsafe impl Sync` in whisper-rs — the model
// weights are read-only after loading.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path` and prepare it for inference.
    ///
    /// `locale` is a BCP-47 tag (e.g. `"en-US"`, `"zh-TW"`); only the
    /// primary subtag is handed to Whisper.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] — `model_path` does not exist.
    /// - [`SttError::ContextInit`]  — whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, locale: &str) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let language = locale
            .split('-')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("auto")
            .to_lowercase();

        Ok(Self {
            ctx,
            language,
            n_threads: optimal_threads(),
        })
    }
}

/// Number of CPU threads to hand to Whisper, capped at 8 to avoid
/// diminishing returns.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

impl Transcriber for WhisperEngine {
    fn transcribe(
        &self,
        audio: &[f32],
        prompt: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, SttError> {
        // ── Audio length guards ───────────────────────────────────────────
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort);
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong);
        }

        // ── Build FullParams ──────────────────────────────────────────────
        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang: Option<&str> = if self.language == "auto" {
            None
        } else {
            Some(self.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        if let Some(p) = prompt {
            fp.set_initial_prompt(p);
        }

        // ── Create per-call state and run inference ───────────────────────
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        // ── Collect segments ──────────────────────────────────────────────
        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut segments: Vec<TranscriptSegment> = Vec::with_capacity(n_segments as usize);

        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;

            let text = text.trim().to_string();
            if text.is_empty() {
                continue;
            }

            // Timestamps are in centiseconds.
            let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0) as f64 / 100.0;
            let t1 = state.full_get_segment_t1(i).unwrap_or(0).max(0) as f64 / 100.0;

            segments.push(TranscriptSegment {
                text,
                wall_start: t0,
                wall_end: t1,
            });
        }

        Ok(segments)
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that plays back scripted results and records the prompts it
/// was called with.
#[cfg(test)]
pub struct MockTranscriber {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<Vec<TranscriptSegment>, SttError>>>,
    prompts: std::sync::Mutex<Vec<Option<String>>>,
    /// Returned once the script is exhausted (`None` ⇒ empty segment list).
    fallback_segment: Option<TranscriptSegment>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Create a mock that plays back `responses` in order, then returns
    /// empty segment lists.
    pub fn scripted(responses: Vec<Result<Vec<TranscriptSegment>, SttError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            prompts: std::sync::Mutex::new(Vec::new()),
            fallback_segment: None,
        }
    }

    /// Create a mock that always returns one segment spanning `[0, end]`
    /// with the given text.
    pub fn ok(text: impl Into<String>, end: f64) -> Self {
        let seg = TranscriptSegment {
            text: text.into(),
            wall_start: 0.0,
            wall_end: end,
        };
        let mut s = Self::scripted(vec![]);
        s.fallback_segment = Some(seg);
        s
    }

    /// Prompts observed so far, in call order.
    pub fn prompts(&self) -> Vec<Option<String>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(
        &self,
        audio: &[f32],
        prompt: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, SttError> {
        // Enforce the audio-length contract even in the mock so that callers
        // are tested against it.
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort);
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong);
        }
        self.prompts.lock().unwrap().push(prompt.map(String::from));
        match self.responses.lock().unwrap().pop_front() {
            Some(r) => r,
            None => Ok(self
                .fallback_segment
                .clone()
                .map(|s| vec![s])
                .unwrap_or_default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- MockTranscriber ---

    #[test]
    fn mock_plays_back_scripted_responses() {
        let seg = TranscriptSegment {
            text: "hello".into(),
            wall_start: 0.0,
            wall_end: 1.5,
        };
        let mock = MockTranscriber::scripted(vec![
            Ok(vec![seg.clone()]),
            Err(SttError::Transcription("boom".into())),
        ]);
        let audio = vec![0.0f32; MIN_AUDIO_SAMPLES];

        assert_eq!(mock.transcribe(&audio, None).unwrap(), vec![seg]);
        assert!(matches!(
            mock.transcribe(&audio, None).unwrap_err(),
            SttError::Transcription(_)
        ));
        // Script exhausted → empty result.
        assert!(mock.transcribe(&audio, None).unwrap().is_empty());
    }

    #[test]
    fn mock_records_prompts() {
        let mock = MockTranscriber::ok("text", 1.0);
        let audio = vec![0.0f32; MIN_AUDIO_SAMPLES];
        mock.transcribe(&audio, None).unwrap();
        mock.transcribe(&audio, Some("hint, previous line")).unwrap();
        assert_eq!(
            mock.prompts(),
            vec![None, Some("hint, previous line".to_string())]
        );
    }

    #[test]
    fn mock_short_audio_returns_audio_too_short() {
        let mock = MockTranscriber::ok("text", 1.0);
        let short = vec![0.0f32; MIN_AUDIO_SAMPLES - 1];
        assert!(matches!(
            mock.transcribe(&short, None).unwrap_err(),
            SttError::AudioTooShort
        ));
    }

    #[test]
    fn mock_long_audio_returns_audio_too_long() {
        let mock = MockTranscriber::ok("text", 1.0);
        let long = vec![0.0f32; MAX_AUDIO_SAMPLES + 1];
        assert!(matches!(
            mock.transcribe(&long, None).unwrap_err(),
            SttError::AudioTooLong
        ));
    }

    // --- WhisperEngine::load missing path ---

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperEngine::load("/nonexistent/model.bin", "en");
        assert!(
            matches!(result, Err(SttError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
    }

    // --- Transcriber object safety ---

    #[test]
    fn box_dyn_transcriber_compiles() {
        // If this test compiles, the trait is object-safe.
        let t: Box<dyn Transcriber> = Box::new(MockTranscriber::ok("ok", 1.0));
        let audio = vec![0.0f32; MIN_AUDIO_SAMPLES];
        let _ = t.transcribe(&audio, None);
    }

    // --- optimal_threads sanity check ---

    #[test]
    fn optimal_threads_is_positive_and_at_most_8() {
        let t = optimal_threads();
        assert!(t >= 1 && t <= 8);
    }
}
