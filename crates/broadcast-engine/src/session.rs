//! The active session and the handle consumers use to find it.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use broadcast_config::{Endpoint, SessionConfiguration};
use broadcast_native::NativeSession;

use crate::error::BroadcastError;
use crate::BroadcastResult;

/// The one live session. Engine resources are released exactly once, on
/// `release` or on drop, whichever comes first.
pub(crate) struct ActiveSession {
    pub(crate) native: Arc<dyn NativeSession>,
    pub(crate) id: String,
    pub(crate) generation: u64,
    pub(crate) config: SessionConfiguration,
    pub(crate) endpoint: Endpoint,
    released: bool,
}

impl ActiveSession {
    pub(crate) fn new(
        native: Arc<dyn NativeSession>,
        generation: u64,
        config: SessionConfiguration,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            id: native.id().to_string(),
            native,
            generation,
            config,
            endpoint,
            released: false,
        }
    }

    /// Stop the engine session.
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.native.stop();
        info!(id = %self.id, generation = self.generation, "Session released");
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// What the controller currently exposes to readers.
#[derive(Clone, Default)]
pub(crate) enum Published {
    #[default]
    Empty,
    Live {
        id: String,
        native: Arc<dyn NativeSession>,
    },
    /// Failed session, kept until `stop`.
    Terminated(String),
}

/// Shared, lock-light view of the controller's session. Written only by
/// the controller while it holds its state lock.
#[derive(Clone, Default)]
pub(crate) struct SessionSlot {
    inner: Arc<RwLock<Published>>,
}

impl SessionSlot {
    pub(crate) fn publish_live(&self, session: &ActiveSession) {
        *self.inner.write() = Published::Live {
            id: session.id.clone(),
            native: Arc::clone(&session.native),
        };
    }

    pub(crate) fn terminate(&self, id: String) {
        *self.inner.write() = Published::Terminated(id);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = Published::Empty;
    }

    pub(crate) fn snapshot(&self) -> Published {
        self.inner.read().clone()
    }

    /// The live native session, or the error an operation on it would get.
    pub(crate) fn live(&self) -> BroadcastResult<Arc<dyn NativeSession>> {
        match &*self.inner.read() {
            Published::Live { native, .. } => Ok(Arc::clone(native)),
            Published::Terminated(id) => Err(BroadcastError::SessionTerminated(id.clone())),
            Published::Empty => Err(BroadcastError::NoActiveSession),
        }
    }
}

/// Cloneable reference to the controller's active session, for consumers
/// such as a preview surface. Never outlives the session it points at:
/// once the session stops or fails, lookups return `None`.
#[derive(Clone)]
pub struct SessionHandle {
    slot: SessionSlot,
}

impl SessionHandle {
    pub(crate) fn new(slot: SessionSlot) -> Self {
        Self { slot }
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<Arc<dyn NativeSession>> {
        self.slot.live().ok()
    }

    /// Id of the active session, if any.
    pub fn current_id(&self) -> Option<String> {
        match self.slot.snapshot() {
            Published::Live { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The session with `id`, only while it is the active one.
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn NativeSession>> {
        match self.slot.snapshot() {
            Published::Live {
                id: live_id,
                native,
            } if live_id == id => Some(native),
            _ => {
                debug!(id, "Session lookup missed");
                None
            }
        }
    }
}
