//! Common types used across IPC messages.

use serde::{Deserialize, Serialize};

/// Kind of capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
    /// Video capture device.
    Camera,

    /// Audio capture device.
    Microphone,

    /// Anything else the engine reports (screen, custom source, ...).
    Other,
}

/// Physical position of a capture device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevicePosition {
    Front,
    Back,
    External,
    #[default]
    Unknown,
}

impl DevicePosition {
    /// Returns the wire name for this position.
    pub fn name(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::External => "external",
            Self::Unknown => "unknown",
        }
    }
}

/// A discoverable capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Stable unique identifier.
    pub id: String,

    /// Display name for the UI.
    pub name: String,

    /// Where the device sits on the hardware.
    pub position: DevicePosition,

    /// Type of device.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    /// Create a new descriptor.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        position: DevicePosition,
        kind: DeviceKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            kind,
        }
    }
}

/// A logical capture slot, distinct from the device bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceRole {
    /// Primary camera.
    Camera,

    /// Primary microphone.
    Microphone,
}

impl DeviceRole {
    /// The device kind this role accepts.
    pub fn kind(self) -> DeviceKind {
        match self {
            Self::Camera => DeviceKind::Camera,
            Self::Microphone => DeviceKind::Microphone,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
        }
    }
}

/// The device currently attached to a role, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    pub role: DeviceRole,
    pub device: Option<DeviceDescriptor>,
}

impl RoleBinding {
    /// Returns true if no device is attached.
    pub fn is_unbound(&self) -> bool {
        self.device.is_none()
    }
}

/// Result of a camera switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResult {
    /// Position of the newly attached camera.
    pub position: DevicePosition,

    /// The newly attached camera.
    pub device: DeviceDescriptor,
}

/// Network health as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkHealth {
    Excellent,
    High,
    Medium,
    Low,
    Bad,
    #[default]
    Unknown,
}

/// Overall broadcast quality relative to the configured maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastQuality {
    Near,
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

/// Transmission statistics of the active session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionStats {
    /// Current bitrate in bps.
    pub current_bitrate: u32,

    /// Bitrate the engine recommends in bps.
    pub recommended_bitrate: u32,

    /// Round trip time in milliseconds.
    pub round_trip_time: u32,

    pub network_health: NetworkHealth,

    pub broadcast_quality: BroadcastQuality,
}

/// Device resource usage while broadcasting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    /// CPU usage percentage (0-100).
    pub cpu: f64,

    /// Memory usage in megabytes.
    pub memory: f64,

    /// Battery level percentage (0-100).
    pub battery: f64,

    /// Device temperature in degrees Celsius.
    pub temperature: f64,
}
