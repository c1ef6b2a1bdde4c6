//! Broadcast session controller.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use broadcast_config::{
    compile, compile_audio, compile_mixer, compile_video, Endpoint, SessionConfiguration,
};
use broadcast_ipc::{
    BroadcastEvent, DeviceDescriptor, DeviceKind, DeviceRole, EngineState, ResourceMetrics,
    RoleBinding, SessionState, SwitchResult, TransmissionStats,
};
use broadcast_native::{
    DeviceCompletion, EventSink, NativeEngine, NativeError, NativeSession, TaggedEvent,
};

use crate::dispatcher::{EventDispatcher, EventListener, ListenerId};
use crate::error::BroadcastError;
use crate::metrics::MetricsAccessor;
use crate::pump;
use crate::registry::{find_device, initial_devices, next_index, DeviceRegistry};
use crate::session::{ActiveSession, SessionHandle, SessionSlot};
use crate::BroadcastResult;

/// Default queue depth above which the dispatcher warns.
pub const DEFAULT_EVENT_QUEUE_WARN_THRESHOLD: usize = 256;

/// Controller tuning.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Undelivered event count that triggers a warning.
    pub event_queue_warn_threshold: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            event_queue_warn_threshold: DEFAULT_EVENT_QUEUE_WARN_THRESHOLD,
        }
    }
}

/// Messages for the pump besides engine events.
pub(crate) enum Control {
    Shutdown,
}

/// A reconnect attempt waiting for its deadline. The pump sleeps on it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingRetry {
    pub(crate) deadline: Instant,
    pub(crate) generation: u64,
    pub(crate) attempt: u32,
}

/// Everything guarded by the controller lock.
#[derive(Default)]
pub(crate) struct ControllerState {
    pub(crate) lifecycle: SessionState,
    pub(crate) session: Option<ActiveSession>,
    /// Id of a session that failed and has not been stopped yet.
    pub(crate) tombstone: Option<String>,
    /// Bumped on every start; tags engine events and timers.
    pub(crate) generation: u64,
    pub(crate) registry: DeviceRegistry,
    pub(crate) pending_retry: Option<PendingRetry>,
}

impl ControllerState {
    /// The live session, or the error an operation on it should fail with.
    pub(crate) fn active(&self) -> BroadcastResult<&ActiveSession> {
        if let Some(id) = &self.tombstone {
            return Err(BroadcastError::SessionTerminated(id.clone()));
        }
        self.session.as_ref().ok_or(BroadcastError::NoActiveSession)
    }

    fn active_mut(&mut self) -> BroadcastResult<&mut ActiveSession> {
        if let Some(id) = &self.tombstone {
            return Err(BroadcastError::SessionTerminated(id.clone()));
        }
        self.session.as_mut().ok_or(BroadcastError::NoActiveSession)
    }

    /// Whether engine events tagged `generation` belong to the live session.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }
}

/// State shared between the controller and its pump.
pub(crate) struct Shared {
    pub(crate) engine: Arc<dyn NativeEngine>,
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) slot: SessionSlot,
    pub(crate) native_tx: Sender<TaggedEvent>,
    pub(crate) control_tx: Sender<Control>,
}

impl Shared {
    /// Move to `next` and publish the change. Called with the lock held so
    /// events are enqueued in transition order.
    pub(crate) fn transition(
        &self,
        state: &mut ControllerState,
        next: SessionState,
        engine_state: Option<EngineState>,
    ) {
        let previous = std::mem::replace(&mut state.lifecycle, next.clone());
        debug!(
            previous = previous.name(),
            current = next.name(),
            engine_state = engine_state.as_ref().map(|s| s.name()),
            "State transition"
        );
        self.dispatcher.publish(BroadcastEvent::StateChanged {
            previous,
            current: next,
            engine_state,
        });
    }

    /// Drop the session and enter `Failed`. The error event goes out first.
    pub(crate) fn fail(
        &self,
        state: &mut ControllerState,
        message: String,
        code: &str,
        engine_state: Option<EngineState>,
    ) {
        error!(%message, code, "Session failed");
        self.dispatcher.publish(BroadcastEvent::Error {
            message: message.clone(),
            code: code.to_string(),
            is_fatal: true,
        });

        if let Some(mut session) = state.session.take() {
            session.release();
            self.slot.terminate(session.id.clone());
            state.tombstone = Some(session.id.clone());
        }
        state.registry.reset();
        state.pending_retry = None;
        self.transition(state, SessionState::Failed { message }, engine_state);
    }

    /// Tear the session down for `stop` or shutdown.
    fn release_session(&self, state: &mut ControllerState) -> Option<String> {
        state.registry.reset();
        state.pending_retry = None;
        self.slot.clear();
        if let Some(id) = state.tombstone.take() {
            return Some(id);
        }
        let mut session = state.session.take()?;
        session.release();
        Some(session.id.clone())
    }
}

/// Owns the single broadcast session and serializes every mutation of it.
///
/// Engine callbacks arrive on a channel drained by a pump thread, which
/// takes the same lock as the public operations. Events go out through an
/// `EventDispatcher` that delivers on its own thread.
pub struct Controller {
    shared: Arc<Shared>,
    pump_thread: Option<JoinHandle<()>>,
}

impl Controller {
    /// Create a controller on top of a native engine.
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self::with_options(engine, ControllerOptions::default())
    }

    pub fn with_options(engine: Arc<dyn NativeEngine>, options: ControllerOptions) -> Self {
        let (native_tx, native_rx) = crossbeam_channel::unbounded();
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        info!(engine = engine.name(), "Creating broadcast controller");

        let shared = Arc::new(Shared {
            engine,
            state: Mutex::new(ControllerState::default()),
            dispatcher: EventDispatcher::new(options.event_queue_warn_threshold),
            slot: SessionSlot::default(),
            native_tx,
            control_tx,
        });

        let pump_thread = spawn_pump(Arc::clone(&shared), native_rx, control_rx);

        Self {
            shared,
            pump_thread,
        }
    }

    /// Register an event listener.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.shared.dispatcher.subscribe(listener)
    }

    /// Register a channel that receives every event from now on.
    pub fn subscribe_channel(&self) -> Receiver<BroadcastEvent> {
        self.shared.dispatcher.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.unsubscribe(id)
    }

    /// Start a session from the host's options object: `rtmpsUrl`,
    /// `streamKey` and the declarative configuration fields. Returns the
    /// engine-assigned session id.
    #[instrument(name = "start_broadcast", skip_all)]
    pub fn start_broadcast(&self, options: &Value) -> BroadcastResult<String> {
        let mut state = self.lock_inactive()?;
        let endpoint = Endpoint::from_options(options)?;
        let config = compile(options)?;
        self.launch(&mut state, config, endpoint)
    }

    /// Start a session from a configuration built in code. It is checked
    /// against the same invariants `compile` enforces.
    #[instrument(name = "start", skip_all)]
    pub fn start(&self, config: SessionConfiguration, endpoint: Endpoint) -> BroadcastResult<String> {
        config.validate()?;
        let mut state = self.lock_inactive()?;
        self.launch(&mut state, config, endpoint)
    }

    /// Stop the session and release every engine resource, whatever state
    /// the connection is in.
    #[instrument(name = "stop_broadcast", skip(self))]
    pub fn stop_broadcast(&self) -> BroadcastResult<()> {
        let mut state = self.shared.state.lock();
        if state.tombstone.is_none() && state.session.is_none() {
            return Err(BroadcastError::NoActiveSession);
        }

        let id = self.shared.release_session(&mut state);
        info!(id = id.as_deref(), from = state.lifecycle.name(), "Broadcast stopped");
        self.shared.transition(&mut state, SessionState::Stopped, None);
        Ok(())
    }

    /// Swap the camera for the next one in discovery order.
    #[instrument(name = "switch_camera", skip(self))]
    pub fn switch_camera(&self) -> BroadcastResult<SwitchResult> {
        let role = DeviceRole::Camera;
        let (native, generation, current) = self.begin_device_op(role)?;
        let result = self.exchange_next_camera(&native, current.as_ref());
        let device = self.finish_device_op(role, generation, result)?;
        Ok(SwitchResult {
            position: device.position,
            device,
        })
    }

    /// Bind the device with `device_id` to `role`. An already bound role is
    /// exchanged rather than detached.
    #[instrument(name = "attach_device", skip(self))]
    pub fn attach_device(&self, role: DeviceRole, device_id: &str) -> BroadcastResult<RoleBinding> {
        let (native, generation, current) = self.begin_device_op(role)?;
        let result = self.bind_by_id(&native, role, current.as_ref(), device_id);
        self.finish_device_op(role, generation, result)?;
        Ok(self.shared.state.lock().registry.binding(role))
    }

    /// Mute or unmute the bound microphone.
    pub fn set_microphone_muted(&self, muted: bool) -> BroadcastResult<()> {
        let state = self.shared.state.lock();
        let session = state.active()?;
        let mic = state
            .registry
            .bound(DeviceRole::Microphone)
            .ok_or(BroadcastError::NoBoundDevice(DeviceRole::Microphone))?;

        session.native.set_muted(mic, muted)?;
        debug!(device = %mic.id, muted, "Microphone mute set");
        Ok(())
    }

    /// Devices of `kind` in discovery order. Always a fresh listing.
    pub fn list_devices(&self, kind: DeviceKind) -> Vec<DeviceDescriptor> {
        self.shared.engine.list_devices(kind)
    }

    pub fn get_transmission_statistics(&self) -> BroadcastResult<TransmissionStats> {
        self.metrics().transmission_stats()
    }

    pub fn get_stream_metrics(&self) -> BroadcastResult<ResourceMetrics> {
        self.metrics().resource_metrics()
    }

    /// Merge a partial video section into the active configuration.
    #[instrument(name = "set_video_config", skip_all)]
    pub fn set_video_config(&self, raw: &Value) -> BroadcastResult<()> {
        self.update_config(|config| {
            let update = compile_video(raw)?;
            config.video = config.video.merged(&update)?;
            Ok(())
        })
    }

    /// Merge a partial audio section into the active configuration.
    #[instrument(name = "set_audio_config", skip_all)]
    pub fn set_audio_config(&self, raw: &Value) -> BroadcastResult<()> {
        self.update_config(|config| {
            let update = compile_audio(raw)?;
            config.audio = config.audio.merged(&update);
            Ok(())
        })
    }

    /// Merge a mixer layout into the active configuration.
    #[instrument(name = "set_mixer_layout", skip_all)]
    pub fn set_mixer_layout(&self, raw: &Value) -> BroadcastResult<()> {
        self.update_config(|config| {
            let update = compile_mixer(raw)?;
            config.mixer = config.mixer.merged(&update);
            Ok(())
        })
    }

    /// Toggle automatic reconnection for the active session. Takes effect
    /// at the next disconnect or retry decision.
    #[instrument(name = "set_auto_reconnect", skip(self))]
    pub fn set_auto_reconnect(&self, enabled: bool) -> BroadcastResult<()> {
        self.update_config(|config| {
            if enabled && config.reconnection.retry_interval.is_zero() {
                return Err(BroadcastError::InvalidField {
                    field: "autoReconnectRetryInterval".into(),
                    reason: "must be positive when reconnection is enabled".into(),
                });
            }
            config.reconnection.enabled = enabled;
            Ok(())
        })
    }

    /// Engine-assigned id of the active session.
    pub fn session_id(&self) -> BroadcastResult<String> {
        Ok(self.shared.state.lock().active()?.id.clone())
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.lock().lifecycle.clone()
    }

    /// When the next reconnect attempt is due, while reconnecting.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.shared
            .state
            .lock()
            .pending_retry
            .map(|retry| retry.deadline)
    }

    pub fn role_binding(&self, role: DeviceRole) -> RoleBinding {
        self.shared.state.lock().registry.binding(role)
    }

    /// Configuration snapshot of the active session.
    pub fn configuration(&self) -> BroadcastResult<SessionConfiguration> {
        Ok(self.shared.state.lock().active()?.config.clone())
    }

    /// A handle for consumers that need the live native session.
    pub fn session_handle(&self) -> SessionHandle {
        SessionHandle::new(self.shared.slot.clone())
    }

    pub fn metrics(&self) -> MetricsAccessor {
        MetricsAccessor::new(self.shared.slot.clone())
    }

    fn lock_inactive(&self) -> BroadcastResult<MutexGuard<'_, ControllerState>> {
        let state = self.shared.state.lock();
        if state.tombstone.is_some() || !state.lifecycle.is_inactive() {
            debug!(state = state.lifecycle.name(), "Rejecting start");
            return Err(BroadcastError::AlreadyActive);
        }
        Ok(state)
    }

    /// Create and connect a session. The lock is held throughout, so engine
    /// callbacks raised during `start` wait until the session is recorded.
    fn launch(
        &self,
        state: &mut ControllerState,
        config: SessionConfiguration,
        endpoint: Endpoint,
    ) -> BroadcastResult<String> {
        state.generation += 1;
        let generation = state.generation;

        let engine = &self.shared.engine;
        let devices = initial_devices(
            &engine.list_devices(DeviceKind::Camera),
            &engine.list_devices(DeviceKind::Microphone),
            config.camera_position,
        );

        let sink = EventSink::new(generation, self.shared.native_tx.clone());
        let native = engine
            .create_session(&config, &devices, sink)
            .map_err(BroadcastError::EngineStart)?;

        if let Err(err) = native.start(&endpoint) {
            warn!(%err, "Engine refused to start the session");
            native.stop();
            return Err(BroadcastError::EngineStart(err));
        }

        let session = ActiveSession::new(native, generation, config, endpoint);
        info!(
            id = %session.id,
            generation,
            url = %session.endpoint.url(),
            devices = devices.len(),
            "Broadcast starting"
        );

        state.registry.reset();
        for device in devices {
            let role = match device.kind {
                DeviceKind::Camera => DeviceRole::Camera,
                DeviceKind::Microphone => DeviceRole::Microphone,
                DeviceKind::Other => continue,
            };
            state.registry.bind(role, device);
        }

        let id = session.id.clone();
        self.shared.slot.publish_live(&session);
        state.session = Some(session);
        self.shared.transition(state, SessionState::Starting, None);
        Ok(id)
    }

    /// Claim `role` and snapshot what the operation needs, then let go of
    /// the lock so the engine can complete off-thread.
    fn begin_device_op(
        &self,
        role: DeviceRole,
    ) -> BroadcastResult<(Arc<dyn NativeSession>, u64, Option<DeviceDescriptor>)> {
        let mut state = self.shared.state.lock();
        let (native, generation) = {
            let session = state.active()?;
            (Arc::clone(&session.native), session.generation)
        };
        state.registry.begin(role, generation)?;
        Ok((native, generation, state.registry.bound(role).cloned()))
    }

    fn exchange_next_camera(
        &self,
        native: &Arc<dyn NativeSession>,
        current: Option<&DeviceDescriptor>,
    ) -> BroadcastResult<DeviceDescriptor> {
        let cameras = self.shared.engine.list_devices(DeviceKind::Camera);
        let target = &cameras[next_index(&cameras, current, DeviceKind::Camera)?];
        debug!(from = current.map(|d| d.id.as_str()), to = %target.id, "Switching camera");

        let completion = match current {
            Some(old) => native.exchange_device(old, target),
            None => native.attach_device(target),
        };
        wait(completion).map_err(BroadcastError::DeviceExchange)
    }

    fn bind_by_id(
        &self,
        native: &Arc<dyn NativeSession>,
        role: DeviceRole,
        current: Option<&DeviceDescriptor>,
        device_id: &str,
    ) -> BroadcastResult<DeviceDescriptor> {
        let devices = self.shared.engine.list_devices(role.kind());
        let target = find_device(&devices, device_id)
            .ok_or_else(|| BroadcastError::DeviceNotFound(device_id.to_string()))?;

        let completion = match current {
            Some(old) => native.exchange_device(old, target),
            None => native.attach_device(target),
        };
        wait(completion).map_err(BroadcastError::DeviceAttach)
    }

    /// Release the claim and commit the binding if the session that started
    /// the operation is still the live one.
    fn finish_device_op(
        &self,
        role: DeviceRole,
        generation: u64,
        result: BroadcastResult<DeviceDescriptor>,
    ) -> BroadcastResult<DeviceDescriptor> {
        let mut state = self.shared.state.lock();
        state.registry.finish(role, generation);
        let device = result?;

        if state.active()?.generation != generation {
            return Err(BroadcastError::NoActiveSession);
        }
        debug!(role = role.name(), device = %device.id, "Role bound");
        state.registry.bind(role, device.clone());
        Ok(device)
    }

    /// Apply `edit` to a copy of the active configuration, hand it to the
    /// engine and commit on success.
    fn update_config<F>(&self, edit: F) -> BroadcastResult<()>
    where
        F: FnOnce(&mut SessionConfiguration) -> BroadcastResult<()>,
    {
        let mut state = self.shared.state.lock();
        let session = state.active_mut()?;

        let mut next = session.config.clone();
        edit(&mut next)?;
        if next == session.config {
            return Ok(());
        }

        session.native.update_configuration(&next)?;
        session.config = next;
        debug!(id = %session.id, "Configuration updated");
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.shared.control_tx.send(Control::Shutdown);
        if let Some(handle) = self.pump_thread.take() {
            let _ = handle.join();
        }

        {
            let mut state = self.shared.state.lock();
            if let Some(id) = self.shared.release_session(&mut state) {
                info!(%id, "Session released on controller shutdown");
            }
        }
        self.shared.dispatcher.shutdown();
    }
}

fn spawn_pump(
    shared: Arc<Shared>,
    native_rx: Receiver<TaggedEvent>,
    control_rx: Receiver<Control>,
) -> Option<JoinHandle<()>> {
    match thread::Builder::new()
        .name("broadcast-pump".into())
        .spawn(move || pump::run(shared, native_rx, control_rx))
    {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(%err, "Failed to spawn event pump");
            None
        }
    }
}

/// Block until the engine completes a device operation.
fn wait(completion: DeviceCompletion) -> Result<DeviceDescriptor, NativeError> {
    completion
        .recv()
        .unwrap_or(Err(NativeError::CompletionDropped))
}
