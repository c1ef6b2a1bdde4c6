//! Error types for the native engine boundary.

use thiserror::Error;

/// Errors the native engine reports back to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// Session could not be created or started.
    #[error("Start failed: {0}")]
    StartFailed(String),

    /// The session was already stopped.
    #[error("Session closed")]
    SessionClosed,

    /// Device is not available to the engine.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device attach failed.
    #[error("Attach failed: {0}")]
    AttachFailed(String),

    /// Device exchange failed.
    #[error("Exchange failed: {0}")]
    ExchangeFailed(String),

    /// Reconnect attempt could not be issued.
    #[error("Reconnect failed: {0}")]
    ReconnectFailed(String),

    /// Engine refused a configuration update.
    #[error("Configuration rejected: {0}")]
    ConfigurationRejected(String),

    /// Engine dropped a completion without answering.
    #[error("Completion dropped by engine")]
    CompletionDropped,
}
