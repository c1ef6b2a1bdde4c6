//! Engine → controller message boundary.

use crossbeam_channel::Sender;
use tracing::trace;

use broadcast_ipc::{DeviceDescriptor, EngineState, NetworkHealth};

/// Callbacks the engine raises for a session.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// Engine state changed.
    StateChanged(EngineState),

    /// Engine error.
    Error {
        message: String,
        code: String,
        fatal: bool,
    },

    /// Device set changed.
    DevicesChanged(Vec<DeviceDescriptor>),

    /// Encoder bitrate changed (bps).
    BitrateChanged(u32),

    /// Network health changed.
    NetworkHealthChanged(NetworkHealth),

    /// OS audio session was interrupted.
    AudioSessionInterrupted,

    /// OS audio session resumed.
    AudioSessionResumed,
}

/// A native event stamped with the session it belongs to.
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub session_tag: u64,
    pub event: NativeEvent,
}

/// Handed to the engine at session creation. The engine emits every
/// callback through it, from whatever thread it runs on.
#[derive(Debug, Clone)]
pub struct EventSink {
    session_tag: u64,
    tx: Sender<TaggedEvent>,
}

impl EventSink {
    /// Create a sink that stamps events with `session_tag`.
    pub fn new(session_tag: u64, tx: Sender<TaggedEvent>) -> Self {
        Self { session_tag, tx }
    }

    /// Emit an event. Returns false if the controller is gone.
    pub fn emit(&self, event: NativeEvent) -> bool {
        trace!(tag = self.session_tag, ?event, "Native event");
        self.tx
            .send(TaggedEvent {
                session_tag: self.session_tag,
                event,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_stamps_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = EventSink::new(7, tx);

        assert!(sink.emit(NativeEvent::BitrateChanged(1200)));

        let tagged = rx.try_recv().unwrap();
        assert_eq!(tagged.session_tag, 7);
        assert_eq!(tagged.event, NativeEvent::BitrateChanged(1200));
    }

    #[test]
    fn test_sink_reports_closed_controller() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = EventSink::new(1, tx);
        drop(rx);

        assert!(!sink.emit(NativeEvent::AudioSessionResumed));
    }
}
