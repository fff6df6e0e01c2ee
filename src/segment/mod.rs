//! Voice-activity segmentation of the capture stream.
//!
//! [`Segmenter`] accumulates 16 kHz mono samples and decides when a chunk is
//! ready for recognition:
//!
//! * **duration cap** — the buffer reached `chunk_duration` seconds, or
//! * **natural pause** — at least 2 s of speech followed by
//!   `pause_duration` seconds whose RMS is below the silence threshold.
//!
//! Each emitted chunk leaves an `overlap` tail in the buffer so words
//! spanning a chunk edge are recognized twice; [`Segmenter::apply_result`]
//! drops the duplicate segments from the second pass.  Fully silent buffers
//! are skipped without reaching the recognizer.
//!
//! Timestamps are offsets into the audio stream (paused spans contribute no
//! samples and therefore no time).

use crate::audio::{rms, TARGET_RATE};
use crate::stt::TranscriptSegment;

/// Minimum seconds of speech before a pause can end a chunk.
const MIN_SPEECH_SECS: f32 = 2.0;

// ---------------------------------------------------------------------------
// PreparedChunk
// ---------------------------------------------------------------------------

/// A snapshot of buffered audio ready for recognition.
#[derive(Debug, Clone)]
pub struct PreparedChunk {
    /// 16 kHz mono samples.
    pub samples: Vec<f32>,
    /// Stream offset of the first sample, in seconds.
    pub wall_start: f64,
    /// True for the first chunk of the session (no preceding overlap).
    pub is_first: bool,
}

// ---------------------------------------------------------------------------
// Segmenter
// ---------------------------------------------------------------------------

/// Rolling sample buffer with pause detection and overlap stitching.
pub struct Segmenter {
    buffer: Vec<f32>,
    /// Total samples ever fed; `total_fed - buffer.len()` is the stream
    /// offset of the buffer start.
    total_fed: u64,
    /// Chunks handed out so far.
    emitted: u64,
    /// Last recognized text, chained into the next chunk's prompt.
    last_text: Option<String>,
    /// Fixed recognition hints (domain vocabulary from the template).
    hints: Vec<String>,

    chunk_samples: usize,
    overlap_samples: usize,
    pause_samples: usize,
    min_emit_samples: usize,
    silence_threshold: f32,
    overlap_secs: f64,
}

impl Segmenter {
    /// Create a segmenter.
    ///
    /// `chunk_duration`, `overlap`, `pause_duration` are seconds;
    /// `silence_threshold` is an RMS amplitude; `hints` seed every
    /// recognition prompt.
    pub fn new(
        chunk_duration: f32,
        overlap: f32,
        silence_threshold: f32,
        pause_duration: f32,
        hints: Vec<String>,
    ) -> Self {
        let rate = TARGET_RATE as f32;
        Self {
            buffer: Vec::new(),
            total_fed: 0,
            emitted: 0,
            last_text: None,
            hints,
            chunk_samples: (chunk_duration * rate) as usize,
            overlap_samples: (overlap * rate) as usize,
            pause_samples: (pause_duration * rate) as usize,
            min_emit_samples: ((MIN_SPEECH_SECS + pause_duration) * rate) as usize,
            silence_threshold,
            overlap_secs: overlap as f64,
        }
    }

    /// Append samples to the rolling buffer.
    pub fn feed(&mut self, samples: &[f32]) {
        self.total_fed += samples.len() as u64;
        self.buffer.extend_from_slice(samples);
    }

    /// Drop all buffered audio (used when recording pauses so a chunk never
    /// spans a pause).  The prompt chain survives.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Seconds of audio currently buffered.
    pub fn buffered_secs(&self) -> f32 {
        self.buffer.len() as f32 / TARGET_RATE as f32
    }

    /// True when the buffer is ready to become a chunk.
    pub fn should_emit(&self) -> bool {
        if self.buffer.len() >= self.chunk_samples {
            return true;
        }
        if self.buffer.len() < self.min_emit_samples {
            return false;
        }
        let split = self.buffer.len() - self.pause_samples;
        let body = &self.buffer[..split];
        let tail = &self.buffer[split..];
        rms(tail) < self.silence_threshold && rms(body) >= self.silence_threshold
    }

    /// Stream offset (seconds) of the first sample currently buffered.
    fn buffer_start_secs(&self) -> f64 {
        (self.total_fed - self.buffer.len() as u64) as f64 / TARGET_RATE as f64
    }

    /// Take the buffered audio as a chunk, retaining the overlap tail.
    ///
    /// Returns `None` when the whole buffer is below the silence threshold —
    /// the audio is discarded (overlap tail kept) and never reaches the
    /// recognizer.
    pub fn take_chunk(&mut self) -> Option<PreparedChunk> {
        if self.buffer.is_empty() {
            return None;
        }

        if rms(&self.buffer) < self.silence_threshold {
            self.retain_overlap_tail();
            return None;
        }

        let wall_start = self.buffer_start_secs();
        let samples = self.buffer.clone();
        self.retain_overlap_tail();

        let is_first = self.emitted == 0;
        self.emitted += 1;

        Some(PreparedChunk {
            samples,
            wall_start,
            is_first,
        })
    }

    /// Final drain at shutdown.  Skips buffers shorter than the minimum
    /// speech length or fully silent.  Clears the buffer either way.
    pub fn flush(&mut self) -> Option<PreparedChunk> {
        let min_samples = (MIN_SPEECH_SECS * TARGET_RATE as f32) as usize;
        if self.buffer.len() < min_samples || rms(&self.buffer) < self.silence_threshold {
            self.buffer.clear();
            return None;
        }

        let wall_start = self.buffer_start_secs();
        let samples = std::mem::take(&mut self.buffer);
        let is_first = self.emitted == 0;
        self.emitted += 1;

        Some(PreparedChunk {
            samples,
            wall_start,
            is_first,
        })
    }

    fn retain_overlap_tail(&mut self) {
        if self.buffer.len() > self.overlap_samples {
            self.buffer.drain(..self.buffer.len() - self.overlap_samples);
        }
    }

    /// Recognition prompt for the next chunk: fixed hints plus the chained
    /// text of the previous chunk.  `None` when both are empty.
    pub fn prompt(&self) -> Option<String> {
        let mut parts: Vec<&str> = self.hints.iter().map(String::as_str).collect();
        if let Some(last) = self.last_text.as_deref() {
            parts.push(last);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// Post-process recognizer output for a chunk.
    ///
    /// Shifts segment times (relative to the chunk) to absolute stream
    /// offsets, drops segments that end inside the overlap region (already
    /// emitted by the previous chunk; the first chunk keeps everything),
    /// and records the last kept text for prompt chaining.
    pub fn apply_result(
        &mut self,
        segments: Vec<TranscriptSegment>,
        wall_start: f64,
        is_first: bool,
    ) -> Vec<TranscriptSegment> {
        let kept: Vec<TranscriptSegment> = segments
            .into_iter()
            .filter(|s| is_first || s.wall_end > self.overlap_secs)
            .map(|s| TranscriptSegment {
                text: s.text,
                wall_start: s.wall_start + wall_start,
                wall_end: s.wall_end + wall_start,
            })
            .collect();

        if let Some(last) = kept.last() {
            self.last_text = Some(last.text.clone());
        }
        kept
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
