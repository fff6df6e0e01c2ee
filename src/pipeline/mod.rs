//! Capture pipeline: dedicated thread, segmentation, sequential
//! transcription worker, events to the controller.

mod coordinator;
mod events;

pub use coordinator::{spawn_pipeline, SourceFactory};
pub use events::{AudioStatus, PipelineControl, PipelineEvent};
