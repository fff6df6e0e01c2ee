//! Command and event vocabulary of the session controller.

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// User commands, regardless of which frontend produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Pause,
    Resume,
    /// End the session: stop capture, run the final digest, terminate.
    Stop,
    /// Fire the quick action at this 1-based template position.
    QuickAction(usize),
    /// Replace the free-text session context used in prompts.
    SetContext(String),
}

// ---------------------------------------------------------------------------
// SessionStatus / SessionEvent
// ---------------------------------------------------------------------------

/// Controller state machine: `Idle → Recording ⇄ Paused → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Recording,
    Paused,
    Stopped,
}

/// Everything the controller publishes to display sinks.  Closed enum —
/// sinks match exhaustively and never see internal state.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Status(SessionStatus),
    /// Newly transcribed lines, formatted `[HH:MM:SS] text`.
    Transcript(Vec<String>),
    /// Input level for a meter (~10 Hz).
    Level { rms: f32 },
    DigestStarted,
    DigestReady { number: u64, markdown: String },
    DigestFailed { consecutive_failures: u32, error: String },
    QueryStarted { label: String },
    QueryResult { label: String, content: String },
    QueryFailed { label: String, error: String },
    /// Unrecoverable failure; the session is shutting down.
    Fatal(String),
}
