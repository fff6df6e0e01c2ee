//! Speech recognition behind the [`Transcriber`] port.

mod engine;

#[cfg(test)]
pub use engine::MockTranscriber;
pub use engine::{SttError, Transcriber, TranscriptSegment, WhisperEngine, MAX_CHUNK_SECS};
