//! Session state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the broadcast session controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    /// No session exists.
    #[default]
    Idle,

    /// Session created, connect issued, waiting for the engine.
    Starting,

    /// Session is connected and transmitting.
    Connected,

    /// Connection lost, retrying.
    Reconnecting {
        /// Zero-based retry attempt.
        attempt: u32,
    },

    /// Session was stopped by the caller.
    Stopped,

    /// Session terminated on a fatal error.
    Failed {
        /// Error message.
        message: String,
    },
}

impl SessionState {
    /// Returns true if the controller is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if no session exists and a new one may be started.
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// Returns true if the session is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the session is reconnecting.
    pub fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }

    /// Returns true if the session failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::Connected => "Connected",
            Self::Reconnecting { .. } => "Reconnecting",
            Self::Stopped => "Stopped",
            Self::Failed { .. } => "Failed",
        }
    }
}

/// The native engine's own state vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineState {
    Invalid,
    Connecting,
    Connected,
    Disconnected,
    Error,
    /// A state this controller does not know about.
    Other(String),
}

impl EngineState {
    pub fn name(&self) -> &str {
        match self {
            Self::Invalid => "INVALID",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Error => "ERROR",
            Self::Other(name) => name,
        }
    }
}
