//! Dead-stream detection and bounded restart policy.
//!
//! Some capture backends silently stop delivering signal (device unplugged,
//! OS routing change, driver stall) while the stream object still reports
//! healthy.  [`RecoveryState`] watches per-frame peak amplitude and tells the
//! owning source when to tear down and rebuild its stream.
//!
//! ## Rules
//!
//! * The silence window only accumulates after the source has produced real
//!   signal at least once — a muted mic at session start is normal, not dead.
//! * Any frame with real signal resets both the silence window and the
//!   restart counter.
//! * Restart attempts are bounded; exhausting them is terminal.

/// Peak amplitude at or below which a frame counts as dead silence.
/// Well under any real microphone noise floor.
const NEAR_ZERO_PEAK: f32 = 1e-4;

// ---------------------------------------------------------------------------
// RecoveryAction
// ---------------------------------------------------------------------------

/// What the owning source should do after observing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Keep reading.
    Continue,
    /// Tear down and rebuild the capture stream.
    Restart,
    /// Restart budget exhausted — the source is dead.
    Fatal,
}

// ---------------------------------------------------------------------------
// RecoveryState
// ---------------------------------------------------------------------------

/// Pure state machine for dead-stream recovery.
///
/// The source calls [`RecoveryState::observe`] with the peak amplitude and
/// duration of every frame it reads and acts on the returned
/// [`RecoveryAction`].  The struct never touches the stream itself.
///
/// # Example
///
/// ```rust
/// use talknotes::audio::{RecoveryAction, RecoveryState};
///
/// let mut rec = RecoveryState::new(15.0, 10);
/// // Real signal first — arms the detector.
/// assert_eq!(rec.observe(0.3, 0.1), RecoveryAction::Continue);
/// // 15 s of dead silence → restart requested.
/// let mut action = RecoveryAction::Continue;
/// for _ in 0..150 {
///     action = rec.observe(0.0, 0.1);
/// }
/// assert_eq!(action, RecoveryAction::Restart);
/// ```
#[derive(Debug)]
pub struct RecoveryState {
    /// Seconds of sustained near-zero peaks before a restart is requested.
    window_secs: f32,
    /// Maximum restart attempts before giving up.
    max_restarts: u32,
    /// True once the source has ever produced real signal.
    heard_signal: bool,
    /// Accumulated dead-silence duration since the last real signal.
    silent_secs: f32,
    /// Restart attempts made since the last real signal.
    restarts: u32,
}

impl RecoveryState {
    /// Create a detector with the given silence window and restart budget.
    pub fn new(window_secs: f32, max_restarts: u32) -> Self {
        Self {
            window_secs,
            max_restarts,
            heard_signal: false,
            silent_secs: 0.0,
            restarts: 0,
        }
    }

    /// Observe one frame: its peak amplitude and its duration in seconds.
    ///
    /// Read timeouts must NOT be fed in as silence — only frames the stream
    /// actually delivered advance the window.
    pub fn observe(&mut self, frame_peak: f32, frame_secs: f32) -> RecoveryAction {
        if frame_peak > NEAR_ZERO_PEAK {
            self.heard_signal = true;
            self.silent_secs = 0.0;
            self.restarts = 0;
            return RecoveryAction::Continue;
        }

        if !self.heard_signal {
            return RecoveryAction::Continue;
        }

        self.silent_secs += frame_secs;
        if self.silent_secs < self.window_secs {
            return RecoveryAction::Continue;
        }

        // Window elapsed: spend one restart attempt (or give up).
        self.silent_secs = 0.0;
        if self.restarts >= self.max_restarts {
            return RecoveryAction::Fatal;
        }
        self.restarts += 1;
        RecoveryAction::Restart
    }

    /// Restart attempts made since the last real signal.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `secs` of dead silence in 100 ms frames, returning the last action.
    fn feed_silence(rec: &mut RecoveryState, secs: f32) -> RecoveryAction {
        let frames = (secs / 0.1).round() as usize;
        let mut action = RecoveryAction::Continue;
        for _ in 0..frames {
            action = rec.observe(0.0, 0.1);
        }
        action
    }

    #[test]
    fn silence_before_any_signal_never_restarts() {
        let mut rec = RecoveryState::new(15.0, 10);
        // A full hour of pre-signal silence: muted mic, not a dead stream.
        assert_eq!(feed_silence(&mut rec, 3600.0), RecoveryAction::Continue);
        assert_eq!(rec.restarts(), 0);
    }

    #[test]
    fn sustained_silence_after_signal_requests_restart() {
        let mut rec = RecoveryState::new(15.0, 10);
        rec.observe(0.3, 0.1);
        assert_eq!(feed_silence(&mut rec, 15.0), RecoveryAction::Restart);
        assert_eq!(rec.restarts(), 1);
    }

    #[test]
    fn signal_resets_window_and_counter() {
        let mut rec = RecoveryState::new(15.0, 10);
        rec.observe(0.3, 0.1);
        assert_eq!(feed_silence(&mut rec, 15.0), RecoveryAction::Restart);

        // 14 s of silence, then real signal: window and counter reset.
        assert_eq!(feed_silence(&mut rec, 14.0), RecoveryAction::Continue);
        rec.observe(0.2, 0.1);
        assert_eq!(rec.restarts(), 0);

        // The next restart needs a full window again.
        assert_eq!(feed_silence(&mut rec, 14.9), RecoveryAction::Continue);
    }

    #[test]
    fn exactly_max_restarts_then_fatal() {
        let mut rec = RecoveryState::new(15.0, 10);
        rec.observe(0.3, 0.1);

        for attempt in 1..=10 {
            assert_eq!(feed_silence(&mut rec, 15.0), RecoveryAction::Restart);
            assert_eq!(rec.restarts(), attempt);
        }
        // Eleventh window with no signal recovered: terminal.
        assert_eq!(feed_silence(&mut rec, 15.0), RecoveryAction::Fatal);
    }

    #[test]
    fn near_zero_threshold_is_below_noise_floor() {
        let mut rec = RecoveryState::new(15.0, 10);
        // Quiet room noise is still signal.
        assert_eq!(rec.observe(0.001, 0.1), RecoveryAction::Continue);
        assert_eq!(feed_silence(&mut rec, 14.9), RecoveryAction::Continue);
        // Noise again before the window elapses: reset.
        rec.observe(0.001, 0.1);
        assert_eq!(feed_silence(&mut rec, 14.9), RecoveryAction::Continue);
    }
}
