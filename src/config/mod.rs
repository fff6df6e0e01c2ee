//! Configuration: settings structs + platform paths.

mod paths;
mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, AudioMode, DigestConfig, InteractiveConfig, LlmConfig, OutputConfig,
    TranscriptionConfig,
};
