//! LLM backend port, wire client, and prompt builders.

mod client;
pub mod prompt;

pub use client::{ApiClient, ChatMessage, ChatResponse, LlmClient, LlmError};
