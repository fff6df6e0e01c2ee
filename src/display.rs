//! Display port.
//!
//! A [`DisplaySink`] is a pure observer of [`SessionEvent`]s — it renders
//! and never feeds input back; user input reaches the controller as
//! commands.  The binary provides a console implementation; tests use
//! recording sinks.

use crate::session::SessionEvent;

/// Observer port for session output.
pub trait DisplaySink: Send + Sync {
    fn publish(&self, event: &SessionEvent);
}

/// Sink that drops everything (headless runs, tests).
pub struct NullSink;

impl DisplaySink for NullSink {
    fn publish(&self, _event: &SessionEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_sink_is_object_safe() {
        let sink: Box<dyn DisplaySink> = Box::new(NullSink);
        sink.publish(&SessionEvent::Level { rms: 0.1 });
    }
}
