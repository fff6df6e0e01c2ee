//! Shared cpal-backed capture core used by [`MicSource`] and
//! [`LoopbackSource`].
//!
//! [`LiveCapture`] owns the cpal device/stream lifecycle, converts raw
//! callback buffers to 16 kHz mono inside `read`, and consults
//! [`RecoveryState`] on every frame so a silently-dead stream gets torn down
//! and rebuilt without the caller noticing (beyond a warning in the log).
//!
//! [`MicSource`]: crate::audio::MicSource
//! [`LoopbackSource`]: crate::audio::LoopbackSource

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::recovery::{RecoveryAction, RecoveryState};
use super::resample::{resample_to_16k, stereo_to_mono};
use super::source::{AudioFrame, AudioSourceError};
use super::vad::peak;

// ---------------------------------------------------------------------------
// DeviceKind
// ---------------------------------------------------------------------------

/// Which capture device a [`LiveCapture`] binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceKind {
    /// The system default input device (microphone).
    DefaultInput,
    /// A monitor/loopback capture device exposing the system output mix.
    Monitor,
}

// ---------------------------------------------------------------------------
// RawChunk
// ---------------------------------------------------------------------------

/// Raw interleaved samples as delivered by the cpal callback.
struct RawChunk {
    samples: Vec<f32>,
}

// ---------------------------------------------------------------------------
// LiveCapture
// ---------------------------------------------------------------------------

/// One cpal capture stream with format conversion and dead-stream recovery.
///
/// Not `Send` (it owns a `cpal::Stream`); construct and use it on the
/// pipeline thread only.
pub(crate) struct LiveCapture {
    kind: DeviceKind,
    recovery: RecoveryState,
    /// Present between `open` and `close`.
    running: Option<Running>,
}

struct Running {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
    rx: mpsc::Receiver<RawChunk>,
    // Held for RAII; dropping stops the hardware stream.
    _stream: cpal::Stream,
}

impl LiveCapture {
    pub(crate) fn new(kind: DeviceKind, silence_recovery_secs: f32, max_restarts: u32) -> Self {
        Self {
            kind,
            recovery: RecoveryState::new(silence_recovery_secs, max_restarts),
            running: None,
        }
    }

    /// Pick the capture device for `kind`.
    ///
    /// Monitor lookup follows the PulseAudio/PipeWire convention of exposing
    /// system output as an input device whose name contains `"monitor"` (or
    /// `"loopback"` on some backends).
    fn pick_device(kind: DeviceKind) -> Result<cpal::Device, AudioSourceError> {
        let host = cpal::default_host();
        match kind {
            DeviceKind::DefaultInput => host
                .default_input_device()
                .ok_or(AudioSourceError::NoInputDevice),
            DeviceKind::Monitor => {
                for device in host.input_devices()? {
                    let name = device.name().unwrap_or_default().to_lowercase();
                    if name.contains("monitor") || name.contains("loopback") {
                        return Ok(device);
                    }
                }
                Err(AudioSourceError::NoLoopbackDevice)
            }
        }
    }

    pub(crate) fn open(&mut self) -> Result<(), AudioSourceError> {
        let device = Self::pick_device(self.kind)?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::channel::<RawChunk>();
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(RawChunk {
                    samples: data.to_vec(),
                });
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::info!(
            "capture stream open: {:?} @ {} Hz, {} ch",
            self.kind,
            sample_rate,
            channels
        );

        self.running = Some(Running {
            device,
            config,
            sample_rate,
            channels,
            rx,
            _stream: stream,
        });
        Ok(())
    }

    /// Tear down and rebuild the stream on the already-selected device.
    fn restart(&mut self) -> Result<(), AudioSourceError> {
        let running = self.running.take().ok_or(AudioSourceError::NotOpen)?;
        let Running {
            device, config, sample_rate, channels, ..
        } = running;

        let (tx, rx) = mpsc::channel::<RawChunk>();
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(RawChunk {
                    samples: data.to_vec(),
                });
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        self.running = Some(Running {
            device,
            config,
            sample_rate,
            channels,
            rx,
            _stream: stream,
        });
        Ok(())
    }

    /// Read the next frame, converted to 16 kHz mono.
    ///
    /// Returns `Ok(None)` on timeout.  Timeouts do not advance the
    /// dead-stream silence window — only delivered frames do.
    pub(crate) fn read(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<AudioFrame>, AudioSourceError> {
        let running = self.running.as_ref().ok_or(AudioSourceError::NotOpen)?;

        let raw = match running.rx.recv_timeout(timeout) {
            Ok(chunk) => chunk,
            Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Callback side is gone (stream died); treat as restartable.
                log::warn!("capture channel disconnected ({:?}), rebuilding stream", self.kind);
                self.restart()?;
                return Ok(None);
            }
        };

        let mono = stereo_to_mono(&raw.samples, running.channels);
        let samples = resample_to_16k(&mono, running.sample_rate);
        let frame = AudioFrame {
            captured_at: Instant::now(),
            samples,
        };

        match self.recovery.observe(peak(&frame.samples), frame.duration_secs()) {
            RecoveryAction::Continue => {}
            RecoveryAction::Restart => {
                log::warn!(
                    "no signal from {:?} stream, restart attempt {}",
                    self.kind,
                    self.recovery.restarts()
                );
                self.restart()?;
            }
            RecoveryAction::Fatal => {
                log::error!("{:?} stream dead after repeated restarts", self.kind);
                return Err(AudioSourceError::StreamDead);
            }
        }

        Ok(Some(frame))
    }

    pub(crate) fn close(&mut self) {
        if self.running.take().is_some() {
            log::info!("capture stream closed: {:?}", self.kind);
        }
    }
}
