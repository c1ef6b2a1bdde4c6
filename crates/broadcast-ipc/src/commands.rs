//! Commands sent from the host to the controller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DeviceKind, DeviceRole};

/// Operations the host can invoke on the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum HostCommand {
    /// Start a broadcast. The options carry the endpoint and the raw config.
    StartBroadcast(Value),

    /// Stop the current broadcast.
    StopBroadcast,

    /// Cycle to the next camera.
    SwitchCamera,

    /// Mute or unmute the bound microphone.
    SetMicrophoneMuted(bool),

    /// Read transmission statistics.
    GetTransmissionStatistics,

    /// Read resource metrics.
    GetStreamMetrics,

    /// List the devices of a kind.
    ListDevices(DeviceKind),

    /// Attach a device to a role.
    AttachDevice {
        role: DeviceRole,
        #[serde(rename = "deviceId")]
        device_id: String,
    },

    /// Update video settings of the active session.
    SetVideoConfig(Value),

    /// Update audio settings of the active session.
    SetAudioConfig(Value),

    /// Update the mixer layout of the active session.
    SetMixerLayout(Value),

    /// Toggle automatic reconnection of the active session.
    SetAutoReconnect(bool),

    /// Read the active session id.
    GetSessionId,

    /// Shut the host down.
    Shutdown,
}

impl HostCommand {
    /// Returns the host-facing method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::StartBroadcast(_) => "startBroadcast",
            Self::StopBroadcast => "stopBroadcast",
            Self::SwitchCamera => "switchCamera",
            Self::SetMicrophoneMuted(_) => "setMicrophoneMuted",
            Self::GetTransmissionStatistics => "getTransmissionStatistics",
            Self::GetStreamMetrics => "getStreamMetrics",
            Self::ListDevices(_) => "listDevices",
            Self::AttachDevice { .. } => "attachDevice",
            Self::SetVideoConfig(_) => "setVideoConfig",
            Self::SetAudioConfig(_) => "setAudioConfig",
            Self::SetMixerLayout(_) => "setMixerLayout",
            Self::SetAutoReconnect(_) => "setAutoReconnect",
            Self::GetSessionId => "getSessionId",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attach_device() {
        let command: HostCommand = serde_json::from_str(
            r#"{"method":"attachDevice","params":{"role":"microphone","deviceId":"mic-2"}}"#,
        )
        .unwrap();

        match command {
            HostCommand::AttachDevice { role, device_id } => {
                assert_eq!(role, DeviceRole::Microphone);
                assert_eq!(device_id, "mic-2");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unit_command() {
        let command: HostCommand = serde_json::from_str(r#"{"method":"switchCamera"}"#).unwrap();
        assert_eq!(command.method(), "switchCamera");
    }
}
