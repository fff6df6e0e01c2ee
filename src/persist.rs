//! Session output on disk.
//!
//! [`FilePersistence`] writes everything a session produces under one
//! timestamped directory:
//!
//! ```text
//! <output>/2026-08-23_141502/
//! ├── transcript_raw.txt      [HH:MM:SS] one line per segment, append-only
//! ├── digest.md               latest digest, overwritten each time
//! ├── recording.wav           processed 16 kHz audio (optional)
//! └── history/
//!     ├── digest_001.md
//!     ├── digest_002.md
//!     └── digest_003_final.md
//! ```
//!
//! Persistence failures are logged and swallowed — losing a write must never
//! take down a live recording.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::stt::TranscriptSegment;

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Render a segment as a transcript line: `[HH:MM:SS] text`.
pub fn format_transcript_line(segment: &TranscriptSegment) -> String {
    let total = segment.wall_start.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    format!("[{h:02}:{m:02}:{s:02}] {}", segment.text)
}

// ---------------------------------------------------------------------------
// PersistenceSink
// ---------------------------------------------------------------------------

/// Port for session output.  All methods are best-effort: implementations
/// log failures and return normally.
pub trait PersistenceSink: Send + Sync {
    /// Append formatted transcript lines to the raw transcript.
    fn append_transcript_lines(&self, lines: &[String]);

    /// Overwrite the latest digest.
    fn save_digest(&self, markdown: &str);

    /// Archive digest number `n` (`is_final` marks the forced final digest).
    fn save_history(&self, markdown: &str, n: u64, is_final: bool);
}

// ---------------------------------------------------------------------------
// FilePersistence
// ---------------------------------------------------------------------------

/// Writes session output under a timestamped directory.
pub struct FilePersistence {
    session_dir: PathBuf,
}

impl FilePersistence {
    /// Create the session directory (and `history/`) under `parent`.
    ///
    /// The directory name is the local start time, `YYYY-MM-DD_HHMMSS`.
    pub fn create(parent: &Path) -> std::io::Result<Self> {
        let name = chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string();
        let session_dir = parent.join(name);
        fs::create_dir_all(session_dir.join("history"))?;
        log::info!("session output: {}", session_dir.display());
        Ok(Self { session_dir })
    }

    /// The session directory all files are written into.
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }
}

impl PersistenceSink for FilePersistence {
    fn append_transcript_lines(&self, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        let path = self.session_dir.join("transcript_raw.txt");
        let result = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| {
                for line in lines {
                    writeln!(f, "{line}")?;
                }
                Ok(())
            });
        if let Err(e) = result {
            log::warn!("failed to append transcript: {e}");
        }
    }

    fn save_digest(&self, markdown: &str) {
        let path = self.session_dir.join("digest.md");
        if let Err(e) = fs::write(&path, markdown) {
            log::warn!("failed to write digest: {e}");
        }
    }

    fn save_history(&self, markdown: &str, n: u64, is_final: bool) {
        let suffix = if is_final { "_final" } else { "" };
        let path = self
            .session_dir
            .join("history")
            .join(format!("digest_{n:03}{suffix}.md"));
        if let Err(e) = fs::write(&path, markdown) {
            log::warn!("failed to archive digest {n}: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
