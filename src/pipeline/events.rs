//! Event and control vocabulary between the pipeline thread and the
//! session controller.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::stt::TranscriptSegment;

// ---------------------------------------------------------------------------
// AudioStatus / PipelineEvent
// ---------------------------------------------------------------------------

/// Lifecycle notifications from the capture side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatus {
    Started,
    Paused,
    Resumed,
    Stopped,
}

/// Everything the pipeline thread reports upward.  Closed enum: the
/// controller can match exhaustively.
#[derive(Debug)]
pub enum PipelineEvent {
    Status(AudioStatus),
    /// Recognized segments with absolute stream timestamps, in order.
    TranscriptChunk(Vec<TranscriptSegment>),
    /// Input level for the UI meter (~10 Hz).
    Level { rms: f32 },
    /// Unrecoverable capture failure; no further events follow except
    /// `Status(Stopped)`.
    Fatal(String),
}

// ---------------------------------------------------------------------------
// PipelineControl
// ---------------------------------------------------------------------------

/// Shared flags the controller flips and the pipeline thread polls.
#[derive(Debug, Default)]
pub struct PipelineControl {
    paused: AtomicBool,
    shutdown: AtomicBool,
}

impl PipelineControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
