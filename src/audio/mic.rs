//! Microphone capture source.

use std::time::Duration;

use super::live::{DeviceKind, LiveCapture};
use super::source::{AudioFrame, AudioSource, AudioSourceError};

/// Captures the system default input device at its native rate and delivers
/// 16 kHz mono frames.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use talknotes::audio::{AudioSource, MicSource};
///
/// let mut mic = MicSource::new(15.0, 10);
/// mic.open().unwrap();
/// if let Some(frame) = mic.read(Duration::from_millis(200)).unwrap() {
///     println!("{} samples", frame.samples.len());
/// }
/// mic.close();
/// ```
pub struct MicSource {
    inner: LiveCapture,
}

impl MicSource {
    /// Create a microphone source with the given dead-stream recovery knobs.
    pub fn new(silence_recovery_secs: f32, max_restarts: u32) -> Self {
        Self {
            inner: LiveCapture::new(DeviceKind::DefaultInput, silence_recovery_secs, max_restarts),
        }
    }
}

impl AudioSource for MicSource {
    fn open(&mut self) -> Result<(), AudioSourceError> {
        self.inner.open()
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, AudioSourceError> {
        self.inner.read(timeout)
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
