//! Error types for controller operations.

use thiserror::Error;

use broadcast_config::CompileError;
use broadcast_ipc::{DeviceKind, DeviceRole};
use broadcast_native::NativeError;

/// Errors returned by controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// A session already exists.
    #[error("Broadcast already running")]
    AlreadyActive,

    /// No session exists.
    #[error("No active broadcast")]
    NoActiveSession,

    /// The endpoint lacks its URL or stream key.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// A configuration field is invalid.
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// Device id is not in the current discovery.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The role has no attached device.
    #[error("No {} attached", .0.name())]
    NoBoundDevice(DeviceRole),

    /// Another device operation on the role is in flight.
    #[error("A {} operation is already in progress", .0.name())]
    OperationInProgress(DeviceRole),

    /// Fewer than two devices of the kind are available.
    #[error("Need at least two {kind:?} devices, found {available}")]
    InsufficientDevices { kind: DeviceKind, available: usize },

    /// The session terminated on a fatal error.
    #[error("Session {0} terminated")]
    SessionTerminated(String),

    /// The engine failed to create or start the session.
    #[error("Broadcast start failed: {0}")]
    EngineStart(NativeError),

    /// The engine failed to exchange devices.
    #[error("Device exchange failed: {0}")]
    DeviceExchange(NativeError),

    /// The engine failed to attach a device.
    #[error("Device attach failed: {0}")]
    DeviceAttach(NativeError),

    /// Any other engine failure.
    #[error("Engine error: {0}")]
    Engine(#[from] NativeError),
}

impl BroadcastError {
    /// Stable code reported to the host.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyActive => "E_ALREADY_RUNNING",
            Self::NoActiveSession => "E_NO_SESSION",
            Self::MissingCredential(_) => "E_MISSING_PARAMS",
            Self::InvalidField { .. } => "E_INVALID_FIELD",
            Self::DeviceNotFound(_) => "E_DEVICE_NOT_FOUND",
            Self::NoBoundDevice(_) => "E_NO_MIC",
            Self::OperationInProgress(_) => "E_OPERATION_IN_PROGRESS",
            Self::InsufficientDevices { .. } => "E_NO_CAMERA",
            Self::SessionTerminated(_) => "E_SESSION_TERMINATED",
            Self::EngineStart(_) => "E_BROADCAST_START",
            Self::DeviceExchange(_) => "E_SWITCH_CAMERA",
            Self::DeviceAttach(_) => "E_ATTACH_DEVICE",
            Self::Engine(_) => "E_ENGINE",
        }
    }

    /// Caller violated a precondition. Never retried automatically.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive
                | Self::NoActiveSession
                | Self::MissingCredential(_)
                | Self::InvalidField { .. }
                | Self::DeviceNotFound(_)
                | Self::NoBoundDevice(_)
                | Self::OperationInProgress(_)
        )
    }
}

impl From<CompileError> for BroadcastError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::InvalidField { field, reason } => Self::InvalidField { field, reason },
            CompileError::MissingCredential(field) => Self::MissingCredential(field),
        }
    }
}
