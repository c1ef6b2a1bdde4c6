//! Events published by the controller to the host.

use serde::{Deserialize, Serialize};

use crate::state::{EngineState, SessionState};
use crate::types::{DeviceDescriptor, NetworkHealth};

/// Events that the controller publishes to its listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "body", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Session state has changed or was re-asserted by the engine.
    StateChanged {
        /// Previous state.
        previous: SessionState,

        /// Current state.
        current: SessionState,

        /// Engine state that caused the change, if the engine raised it.
        #[serde(rename = "engineState", skip_serializing_if = "Option::is_none")]
        engine_state: Option<EngineState>,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,

        /// Stable error code.
        code: String,

        /// Whether the error terminated the session.
        #[serde(rename = "isFatal")]
        is_fatal: bool,
    },

    /// The engine's device set changed.
    DeviceChanged { devices: Vec<DeviceDescriptor> },

    /// Encoder bitrate changed (bps).
    BitrateChanged { bitrate: u32 },

    /// Network health changed.
    NetworkHealthChanged { health: NetworkHealth },

    /// Reconnection started.
    #[serde(rename = "reconnecting")]
    ReconnectStarted,

    /// Reconnection succeeded.
    #[serde(rename = "reconnected")]
    ReconnectSucceeded,

    /// The OS interrupted the audio session.
    #[serde(rename = "audioSessionInterrupted")]
    AudioInterrupted,

    /// The OS resumed the audio session.
    #[serde(rename = "audioSessionResumed")]
    AudioResumed,

    /// The engine reported a state the controller does not map.
    EngineStateIgnored { state: EngineState },
}

impl BroadcastEvent {
    /// Returns the host-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "stateChanged",
            Self::Error { .. } => "error",
            Self::DeviceChanged { .. } => "deviceChanged",
            Self::BitrateChanged { .. } => "bitrateChanged",
            Self::NetworkHealthChanged { .. } => "networkHealthChanged",
            Self::ReconnectStarted => "reconnecting",
            Self::ReconnectSucceeded => "reconnected",
            Self::AudioInterrupted => "audioSessionInterrupted",
            Self::AudioResumed => "audioSessionResumed",
            Self::EngineStateIgnored { .. } => "engineStateIgnored",
        }
    }

    /// Returns true for error events that terminated the session.
    pub fn is_fatal_error(&self) -> bool {
        matches!(self, Self::Error { is_fatal: true, .. })
    }
}
