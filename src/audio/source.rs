//! The capture-side port: [`AudioSource`] and its frame/error vocabulary.
//!
//! Everything downstream of this trait (segmenter, recognizer, digests) sees
//! only **16 kHz mono `f32`** frames — format conversion happens inside the
//! sources.  Implementations are constructed on the pipeline thread because
//! `cpal::Stream` is not `Send`.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Sample rate every source delivers, matching what Whisper expects.
pub const TARGET_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One buffer of processed audio: 16 kHz mono `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono PCM samples at [`TARGET_RATE`].
    pub samples: Vec<f32>,
    /// When the frame was read from the capture stream.
    pub captured_at: Instant,
}

impl AudioFrame {
    /// Frame duration in seconds, derived from the sample count.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / TARGET_RATE as f32
    }
}

// ---------------------------------------------------------------------------
// AudioSourceError
// ---------------------------------------------------------------------------

/// Errors raised by audio sources.
#[derive(Debug, Error)]
pub enum AudioSourceError {
    #[error("no input device found on the default audio host")]
    NoInputDevice,

    #[error("no loopback/monitor capture device found (is a monitor source enabled?)")]
    NoLoopbackDevice,

    #[error("failed to enumerate capture devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio stream produced no signal and exhausted its restart budget")]
    StreamDead,

    #[error("source is not open")]
    NotOpen,
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Port for anything that can deliver a stream of [`AudioFrame`]s.
///
/// Lifecycle: `open` → repeated `read` → `close`.  `read` returns
/// `Ok(None)` when no frame arrived within `timeout` (the caller keeps its
/// loop responsive); `Err` is reserved for unrecoverable conditions.
pub trait AudioSource {
    /// Acquire devices and start the capture stream(s).
    fn open(&mut self) -> Result<(), AudioSourceError>;

    /// Read the next frame, waiting at most `timeout`.
    fn read(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, AudioSourceError>;

    /// Stop the capture stream(s).  Idempotent.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// `AudioSource` must stay object safe — `MixedSource` holds its inputs
    /// as `Box<dyn AudioSource>`.
    #[test]
    fn audio_source_is_object_safe() {
        fn assert_object_safe(_: &dyn AudioSource) {}
        let _ = assert_object_safe;
    }

    /// `AudioFrame` must be `Send` so it can cross thread boundaries.
    #[test]
    fn audio_frame_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioFrame>();
    }

    #[test]
    fn frame_duration_from_sample_count() {
        let frame = AudioFrame {
            samples: vec![0.0_f32; 16_000],
            captured_at: Instant::now(),
        };
        assert!((frame.duration_secs() - 1.0).abs() < 1e-6);
    }
}
