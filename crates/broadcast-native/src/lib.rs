//! Native broadcast engine boundary.
//!
//! The encoder, muxer and transport live in an opaque native engine. This
//! crate defines the primitives the controller needs from it (start, stop,
//! attach, exchange, stats) and the channel through which the engine reports
//! back. `SimulatedEngine` is an in-memory implementation.

mod error;
mod sim;
mod sink;

pub use error::NativeError;
pub use sim::{SimulatedEngine, SimulatedSession};
pub use sink::{EventSink, NativeEvent, TaggedEvent};

use std::sync::Arc;

use crossbeam_channel::Receiver;

use broadcast_config::{Endpoint, SessionConfiguration};
use broadcast_ipc::{DeviceDescriptor, DeviceKind, ResourceMetrics, TransmissionStats};

/// Result type for native operations.
pub type NativeResult<T> = Result<T, NativeError>;

/// Reply channel for device operations the engine completes off-thread.
/// Yields the device that ended up attached.
pub type DeviceCompletion = Receiver<NativeResult<DeviceDescriptor>>;

/// Entry point into the native engine.
pub trait NativeEngine: Send + Sync {
    /// Enumerate the devices of a kind, in discovery order.
    fn list_devices(&self, kind: DeviceKind) -> Vec<DeviceDescriptor>;

    /// Allocate a session with its initial devices. Every callback for this
    /// session goes through `sink`.
    fn create_session(
        &self,
        config: &SessionConfiguration,
        devices: &[DeviceDescriptor],
        sink: EventSink,
    ) -> NativeResult<Arc<dyn NativeSession>>;

    /// Engine name for diagnostics.
    fn name(&self) -> &'static str;
}

/// A live engine session.
pub trait NativeSession: Send + Sync {
    /// Engine-assigned session id.
    fn id(&self) -> &str;

    /// Issue the connect call. Connection progress arrives as events.
    fn start(&self, endpoint: &Endpoint) -> NativeResult<()>;

    /// Retry the connection to the endpoint given at `start`.
    fn reconnect(&self) -> NativeResult<()>;

    /// Release every engine resource. Idempotent.
    fn stop(&self);

    /// Attach a device to the stream.
    fn attach_device(&self, device: &DeviceDescriptor) -> DeviceCompletion;

    /// Replace `old` with `new` without a gap in the output.
    fn exchange_device(&self, old: &DeviceDescriptor, new: &DeviceDescriptor)
        -> DeviceCompletion;

    /// Mute or unmute an attached microphone.
    fn set_muted(&self, device: &DeviceDescriptor, muted: bool) -> NativeResult<()>;

    /// Apply a new configuration snapshot.
    fn update_configuration(&self, config: &SessionConfiguration) -> NativeResult<()>;

    fn transmission_stats(&self) -> TransmissionStats;

    fn resource_metrics(&self) -> ResourceMetrics;
}
