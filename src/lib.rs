//! talknotes — live transcription with periodic LLM digests.
//!
//! # Pipeline
//!
//! ```text
//! mic / loopback / mix ──► Segmenter ──► Whisper ──► SessionController
//!        (cpal)             (chunks)     (worker)         │
//!                                                         ├─► digests (LLM)
//!                                                         ├─► quick actions
//!                                                         ├─► files on disk
//!                                                         └─► display sinks
//! ```
//!
//! Capture and recognition live on dedicated threads; the session
//! controller is a single async task that owns all digest state.

pub mod audio;
pub mod config;
pub mod display;
pub mod llm;
pub mod persist;
pub mod pipeline;
pub mod segment;
pub mod session;
pub mod stt;
pub mod template;
