//! Host command handlers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use broadcast_engine::{BroadcastError, Controller};
use broadcast_ipc::HostCommand;

/// Error reported back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl CommandError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<BroadcastError> for CommandError {
    fn from(err: BroadcastError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::new("E_SERIALIZE", err.to_string())
    }
}

pub type CommandResult = Result<Value, CommandError>;

/// Run one command against the controller.
///
/// `Shutdown` is handled by the caller; here it is a no-op.
pub fn dispatch(controller: &Controller, command: HostCommand) -> CommandResult {
    match command {
        HostCommand::StartBroadcast(options) => {
            let id = controller.start_broadcast(&options)?;
            Ok(json!({ "sessionId": id }))
        }
        HostCommand::StopBroadcast => {
            controller.stop_broadcast()?;
            Ok(Value::Null)
        }
        HostCommand::SwitchCamera => Ok(serde_json::to_value(controller.switch_camera()?)?),
        HostCommand::SetMicrophoneMuted(muted) => {
            controller.set_microphone_muted(muted)?;
            Ok(Value::Null)
        }
        HostCommand::GetTransmissionStatistics => Ok(serde_json::to_value(
            controller.get_transmission_statistics()?,
        )?),
        HostCommand::GetStreamMetrics => {
            Ok(serde_json::to_value(controller.get_stream_metrics()?)?)
        }
        HostCommand::ListDevices(kind) => Ok(serde_json::to_value(controller.list_devices(kind))?),
        HostCommand::AttachDevice { role, device_id } => Ok(serde_json::to_value(
            controller.attach_device(role, &device_id)?,
        )?),
        HostCommand::SetVideoConfig(raw) => {
            controller.set_video_config(&raw)?;
            Ok(Value::Null)
        }
        HostCommand::SetAudioConfig(raw) => {
            controller.set_audio_config(&raw)?;
            Ok(Value::Null)
        }
        HostCommand::SetMixerLayout(raw) => {
            controller.set_mixer_layout(&raw)?;
            Ok(Value::Null)
        }
        HostCommand::SetAutoReconnect(enabled) => {
            controller.set_auto_reconnect(enabled)?;
            Ok(Value::Null)
        }
        HostCommand::GetSessionId => Ok(json!({ "sessionId": controller.session_id()? })),
        HostCommand::Shutdown => Ok(Value::Null),
    }
}

/// The line written back for a command.
pub fn response(method: Option<&str>, result: CommandResult) -> Value {
    match result {
        Ok(result) => json!({ "method": method, "ok": true, "result": result }),
        Err(error) => json!({ "method": method, "ok": false, "error": error }),
    }
}
