//! Blended microphone + system-output source.
//!
//! [`MixedSource`] wraps two [`AudioSource`]s and merges them into a single
//! 16 kHz mono stream:
//!
//! * the **microphone cadence drives output** — one mixed frame per mic
//!   frame;
//! * system audio accumulates in a rolling buffer and is consumed in slices
//!   of equal duration to each mic frame;
//! * samples are blended as `(mic + system) * 0.5` — fixed attenuation so
//!   two full-scale inputs cannot clip, not loudness normalization;
//! * until the first system audio arrives the mic is passed through at full
//!   amplitude (blending against an empty buffer would halve the voice);
//! * a short system slice is zero-padded rather than stalling the mic.

use std::collections::VecDeque;
use std::time::Duration;

use super::source::{AudioFrame, AudioSource, AudioSourceError};

/// Per-input attenuation applied when both streams are live.
const BLEND: f32 = 0.5;

// ---------------------------------------------------------------------------
// MixedSource
// ---------------------------------------------------------------------------

/// Mixes a microphone source and a system-output source sample for sample.
///
/// Fails if either underlying source fails — a session recording "both sides"
/// must not silently degrade to one.
pub struct MixedSource {
    mic: Box<dyn AudioSource>,
    system: Box<dyn AudioSource>,
    /// Rolling buffer of system samples not yet consumed.
    system_buf: VecDeque<f32>,
    /// True once the system source has ever delivered samples.
    system_started: bool,
}

impl MixedSource {
    pub fn new(mic: Box<dyn AudioSource>, system: Box<dyn AudioSource>) -> Self {
        Self {
            mic,
            system,
            system_buf: VecDeque::new(),
            system_started: false,
        }
    }

    /// Pull everything the system source currently has, without blocking.
    fn drain_system(&mut self) -> Result<(), AudioSourceError> {
        while let Some(frame) = self.system.read(Duration::ZERO)? {
            if !frame.samples.is_empty() {
                self.system_started = true;
                self.system_buf.extend(frame.samples);
            }
        }
        Ok(())
    }
}

impl AudioSource for MixedSource {
    fn open(&mut self) -> Result<(), AudioSourceError> {
        self.mic.open()?;
        self.system.open()?;
        Ok(())
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, AudioSourceError> {
        let mic_frame = match self.mic.read(timeout)? {
            Some(frame) => frame,
            None => {
                // Keep the system buffer warm even while the mic is quiet
                // between hardware buffers.
                self.drain_system()?;
                return Ok(None);
            }
        };

        self.drain_system()?;

        if !self.system_started {
            return Ok(Some(mic_frame));
        }

        let mut samples = Vec::with_capacity(mic_frame.samples.len());
        for &m in &mic_frame.samples {
            // Zero-pad when the system slice runs short of the mic frame.
            let s = self.system_buf.pop_front().unwrap_or(0.0);
            samples.push((m + s) * BLEND);
        }

        Ok(Some(AudioFrame {
            samples,
            captured_at: mic_frame.captured_at,
        }))
    }

    fn close(&mut self) {
        self.mic.close();
        self.system.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Plays back a fixed script of frames, then reports timeouts forever.
    struct ScriptedSource {
        frames: VecDeque<Vec<f32>>,
        fail_on_read: bool,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Vec<f32>>) -> Self {
            Self {
                frames: frames.into(),
                fail_on_read: false,
            }
        }

        fn failing() -> Self {
            Self {
                frames: VecDeque::new(),
                fail_on_read: true,
            }
        }
    }

    impl AudioSource for ScriptedSource {
        fn open(&mut self) -> Result<(), AudioSourceError> {
            Ok(())
        }

        fn read(&mut self, _timeout: Duration) -> Result<Option<AudioFrame>, AudioSourceError> {
            if self.fail_on_read {
                return Err(AudioSourceError::StreamDead);
            }
            Ok(self.frames.pop_front().map(|samples| AudioFrame {
                samples,
                captured_at: Instant::now(),
            }))
        }

        fn close(&mut self) {}
    }

    #[test]
    fn blends_at_half_amplitude_each() {
        let mic = ScriptedSource::new(vec![vec![0.8_f32; 160]]);
        let sys = ScriptedSource::new(vec![vec![0.6_f32; 160]]);
        let mut mixed = MixedSource::new(Box::new(mic), Box::new(sys));

        let frame = mixed
            .read(Duration::from_millis(10))
            .unwrap()
            .expect("mixed frame");
        assert_eq!(frame.samples.len(), 160);
        for &s in &frame.samples {
            // 0.5*0.8 + 0.5*0.6 = 0.7
            assert!((s - 0.7).abs() < 1e-6, "expected 0.7, got {s}");
        }
    }

    #[test]
    fn mic_passthrough_before_system_audio_arrives() {
        let mic = ScriptedSource::new(vec![vec![0.8_f32; 160]]);
        let sys = ScriptedSource::new(vec![]);
        let mut mixed = MixedSource::new(Box::new(mic), Box::new(sys));

        let frame = mixed.read(Duration::from_millis(10)).unwrap().unwrap();
        for &s in &frame.samples {
            assert!((s - 0.8).abs() < 1e-6, "expected passthrough, got {s}");
        }
    }

    #[test]
    fn short_system_tail_is_zero_padded() {
        // System delivers only half a frame's worth of samples.
        let mic = ScriptedSource::new(vec![vec![0.8_f32; 160]]);
        let sys = ScriptedSource::new(vec![vec![0.6_f32; 80]]);
        let mut mixed = MixedSource::new(Box::new(mic), Box::new(sys));

        let frame = mixed.read(Duration::from_millis(10)).unwrap().unwrap();
        for &s in &frame.samples[..80] {
            assert!((s - 0.7).abs() < 1e-6);
        }
        for &s in &frame.samples[80..] {
            // (0.8 + 0.0) * 0.5
            assert!((s - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_mic_frame_still_buffers_system_audio() {
        let mic = ScriptedSource::new(vec![vec![], vec![0.8_f32; 160]]);
        let sys = ScriptedSource::new(vec![vec![0.6_f32; 160]]);
        let mut mixed = MixedSource::new(Box::new(mic), Box::new(sys));

        // First mic frame is empty (no samples) -> output empty frame, but
        // the system buffer fills behind the scenes.
        let first = mixed.read(Duration::from_millis(10)).unwrap().unwrap();
        assert!(first.samples.is_empty());

        let second = mixed.read(Duration::from_millis(10)).unwrap().unwrap();
        for &s in &second.samples {
            assert!((s - 0.7).abs() < 1e-6);
        }
    }

    #[test]
    fn underlying_failure_propagates() {
        let mic = ScriptedSource::new(vec![vec![0.8_f32; 160]]);
        let sys = ScriptedSource::failing();
        let mut mixed = MixedSource::new(Box::new(mic), Box::new(sys));

        assert!(matches!(
            mixed.read(Duration::from_millis(10)),
            Err(AudioSourceError::StreamDead)
        ));
    }
}
