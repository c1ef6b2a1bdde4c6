//! Read-only access to the active session's statistics.

use tracing::trace;

use broadcast_ipc::{ResourceMetrics, TransmissionStats};

use crate::session::SessionSlot;
use crate::BroadcastResult;

/// Reads transmission and resource metrics from the active session.
///
/// Does not take the controller lock, so reads proceed concurrently with
/// state mutation.
#[derive(Clone)]
pub struct MetricsAccessor {
    slot: SessionSlot,
}

impl MetricsAccessor {
    pub(crate) fn new(slot: SessionSlot) -> Self {
        Self { slot }
    }

    /// Current transmission statistics.
    pub fn transmission_stats(&self) -> BroadcastResult<TransmissionStats> {
        let stats = self.slot.live()?.transmission_stats();
        trace!(bitrate = stats.current_bitrate, "Transmission stats read");
        Ok(stats)
    }

    /// Current device resource usage.
    pub fn resource_metrics(&self) -> BroadcastResult<ResourceMetrics> {
        Ok(self.slot.live()?.resource_metrics())
    }
}
