//! Session orchestration: digest state, trigger policy, compaction, and the
//! controller task.

mod controller;
mod events;
mod state;

pub use controller::SessionController;
pub use events::{SessionCommand, SessionEvent, SessionStatus};
pub use state::{compact_messages, should_trigger_digest, DigestState};
