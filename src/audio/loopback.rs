//! System-output (loopback) capture source.

use std::time::Duration;

use super::live::{DeviceKind, LiveCapture};
use super::source::{AudioFrame, AudioSource, AudioSourceError};

/// Captures what the system is playing by binding to a monitor/loopback
/// capture device, delivering 16 kHz mono frames.
///
/// On PulseAudio/PipeWire every output sink exposes a matching monitor
/// source; `open` fails with
/// [`AudioSourceError::NoLoopbackDevice`] when none is found.
pub struct LoopbackSource {
    inner: LiveCapture,
}

impl LoopbackSource {
    /// Create a loopback source with the given dead-stream recovery knobs.
    pub fn new(silence_recovery_secs: f32, max_restarts: u32) -> Self {
        Self {
            inner: LiveCapture::new(DeviceKind::Monitor, silence_recovery_secs, max_restarts),
        }
    }
}

impl AudioSource for LoopbackSource {
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
