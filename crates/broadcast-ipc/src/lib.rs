//! Typed host<->controller messages for the broadcast session controller.
//!
//! This crate defines the commands a host can issue, the events the
//! controller publishes back, and the records both sides exchange.

mod commands;
mod events;
mod state;
mod types;

pub use commands::HostCommand;
pub use events::BroadcastEvent;
pub use state::{EngineState, SessionState};
pub use types::{
    BroadcastQuality, DeviceDescriptor, DeviceKind, DevicePosition, DeviceRole, NetworkHealth,
    ResourceMetrics, RoleBinding, SwitchResult, TransmissionStats,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (host → controller).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<HostCommand>, Receiver<HostCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates an event channel. Events are never dropped, so it is unbounded.
pub fn event_channel() -> (Sender<BroadcastEvent>, Receiver<BroadcastEvent>) {
    crossbeam_channel::unbounded()
}
