//! Broadcast session controller.
//!
//! Owns the single live broadcast session on top of a native engine:
//! sequences its lifecycle, serializes device hot-swaps, drives automatic
//! reconnection and republishes engine callbacks as ordered events.

mod controller;
mod dispatcher;
mod error;
mod metrics;
mod pump;
mod reconnect;
mod registry;
mod session;

pub use controller::{Controller, ControllerOptions, DEFAULT_EVENT_QUEUE_WARN_THRESHOLD};
pub use dispatcher::{EventDispatcher, EventListener, ListenerId};
pub use error::BroadcastError;
pub use metrics::MetricsAccessor;
pub use reconnect::ReconnectPolicy;
pub use registry::{find_device, initial_devices, next_index, DeviceRegistry};
pub use session::SessionHandle;

use std::sync::Arc;

use broadcast_native::NativeEngine;

/// Result type for controller operations.
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Create a controller with default options.
pub fn create_controller(engine: Arc<dyn NativeEngine>) -> Controller {
    Controller::new(engine)
}
