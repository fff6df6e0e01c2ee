//! Audio capture, conversion, and dead-stream recovery.
//!
//! ```text
//! cpal callback ──► LiveCapture (downmix + resample + recovery)
//!                        │
//!         MicSource ─────┤
//!         LoopbackSource ┤──► AudioSource::read ──► AudioFrame (16 kHz mono)
//!         MixedSource ───┘
//! ```

mod live;
mod loopback;
mod mic;
mod mixed;
mod recovery;
mod resample;
mod source;
mod vad;

pub use loopback::LoopbackSource;
pub use mic::MicSource;
pub use mixed::MixedSource;
pub use recovery::{RecoveryAction, RecoveryState};
pub use resample::{resample_to_16k, stereo_to_mono};
pub use source::{AudioFrame, AudioSource, AudioSourceError, TARGET_RATE};
pub use vad::{peak, rms};
