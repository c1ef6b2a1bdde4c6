//! In-memory engine that behaves like the native one, minus the media.
//!
//! Used by the host binary and by tests. Failures, device sets and device
//! operation latency are scriptable; session callbacks can be raised by hand
//! through `SimulatedSession::emit`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use broadcast_config::{Endpoint, SessionConfiguration};
use broadcast_ipc::{
    BroadcastQuality, DeviceDescriptor, DeviceKind, DevicePosition, EngineState, NetworkHealth,
    ResourceMetrics, TransmissionStats,
};

use crate::error::NativeError;
use crate::sink::{EventSink, NativeEvent};
use crate::{DeviceCompletion, NativeEngine, NativeResult, NativeSession};

/// Failures queued for the next matching call.
#[derive(Default)]
struct Script {
    fail_create: Option<String>,
    fail_start: Option<String>,
    fail_exchange: Option<String>,
    reject_configuration: Option<String>,
    failing_reconnects: u32,
}

struct EngineInner {
    devices: RwLock<Vec<DeviceDescriptor>>,
    script: Mutex<Script>,
    auto_connect: AtomicBool,
    device_delay: RwLock<Duration>,
    live_sessions: AtomicUsize,
    sessions_created: AtomicU64,
    current: Mutex<Weak<SimulatedSession>>,
}

/// Simulated native engine.
#[derive(Clone)]
pub struct SimulatedEngine {
    inner: Arc<EngineInner>,
}

impl SimulatedEngine {
    /// An engine with a front camera, a back camera and one microphone.
    pub fn new() -> Self {
        Self::with_devices(vec![
            DeviceDescriptor::new(
                "camera-front",
                "Front Camera",
                DevicePosition::Front,
                DeviceKind::Camera,
            ),
            DeviceDescriptor::new(
                "camera-back",
                "Back Camera",
                DevicePosition::Back,
                DeviceKind::Camera,
            ),
            DeviceDescriptor::new(
                "mic-builtin",
                "Built-in Microphone",
                DevicePosition::Unknown,
                DeviceKind::Microphone,
            ),
        ])
    }

    /// An engine with the given devices, in discovery order.
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                devices: RwLock::new(devices),
                script: Mutex::new(Script::default()),
                auto_connect: AtomicBool::new(true),
                device_delay: RwLock::new(Duration::ZERO),
                live_sessions: AtomicUsize::new(0),
                sessions_created: AtomicU64::new(0),
                current: Mutex::new(Weak::new()),
            }),
        }
    }

    /// Replace the device set and notify the current session.
    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        *self.inner.devices.write() = devices.clone();
        if let Some(session) = self.current_session() {
            session.emit(NativeEvent::DevicesChanged(devices));
        }
    }

    /// Unplug a device.
    pub fn remove_device(&self, id: &str) {
        let devices: Vec<_> = self
            .inner
            .devices
            .read()
            .iter()
            .filter(|device| device.id != id)
            .cloned()
            .collect();
        self.set_devices(devices);
    }

    /// Whether `start`/`reconnect` immediately report Connecting → Connected.
    pub fn set_auto_connect(&self, enabled: bool) {
        self.inner.auto_connect.store(enabled, Ordering::SeqCst);
    }

    /// Latency before attach/exchange completions are delivered.
    pub fn set_device_delay(&self, delay: Duration) {
        *self.inner.device_delay.write() = delay;
    }

    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.inner.script.lock().fail_create = Some(message.into());
    }

    pub fn fail_next_start(&self, message: impl Into<String>) {
        self.inner.script.lock().fail_start = Some(message.into());
    }

    pub fn fail_next_exchange(&self, message: impl Into<String>) {
        self.inner.script.lock().fail_exchange = Some(message.into());
    }

    pub fn reject_next_configuration(&self, message: impl Into<String>) {
        self.inner.script.lock().reject_configuration = Some(message.into());
    }

    /// The next `count` reconnect attempts end in Disconnected.
    pub fn fail_reconnects(&self, count: u32) {
        self.inner.script.lock().failing_reconnects = count;
    }

    /// Sessions created and not yet stopped.
    pub fn live_sessions(&self) -> usize {
        self.inner.live_sessions.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> u64 {
        self.inner.sessions_created.load(Ordering::SeqCst)
    }

    /// The most recently created session, while someone still holds it.
    pub fn current_session(&self) -> Option<Arc<SimulatedSession>> {
        self.inner.current.lock().upgrade()
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for SimulatedEngine {
    fn list_devices(&self, kind: DeviceKind) -> Vec<DeviceDescriptor> {
        self.inner
            .devices
            .read()
            .iter()
            .filter(|device| device.kind == kind)
            .cloned()
            .collect()
    }

    #[instrument(name = "sim_create_session", skip_all)]
    fn create_session(
        &self,
        config: &SessionConfiguration,
        devices: &[DeviceDescriptor],
        sink: EventSink,
    ) -> NativeResult<Arc<dyn NativeSession>> {
        if let Some(message) = self.inner.script.lock().fail_create.take() {
            return Err(NativeError::StartFailed(message));
        }

        {
            let known = self.inner.devices.read();
            if let Some(missing) = devices.iter().find(|device| !known.contains(device)) {
                return Err(NativeError::DeviceUnavailable(missing.id.clone()));
            }
        }

        let number = self.inner.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(SimulatedSession {
            id: format!("sim-{number}"),
            engine: Arc::clone(&self.inner),
            sink,
            attached: Mutex::new(devices.to_vec()),
            muted: Mutex::new(HashSet::new()),
            config: Mutex::new(config.clone()),
            stats: RwLock::new(TransmissionStats {
                network_health: NetworkHealth::Excellent,
                broadcast_quality: BroadcastQuality::Near,
                ..Default::default()
            }),
            endpoint: Mutex::new(None),
            stopped: AtomicBool::new(false),
        });

        self.inner.live_sessions.fetch_add(1, Ordering::SeqCst);
        *self.inner.current.lock() = Arc::downgrade(&session);

        debug!(id = %session.id, devices = devices.len(), "Simulated session created");
        Ok(session)
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

/// A session of the simulated engine.
pub struct SimulatedSession {
    id: String,
    engine: Arc<EngineInner>,
    sink: EventSink,
    attached: Mutex<Vec<DeviceDescriptor>>,
    muted: Mutex<HashSet<String>>,
    config: Mutex<SessionConfiguration>,
    stats: RwLock<TransmissionStats>,
    endpoint: Mutex<Option<Endpoint>>,
    stopped: AtomicBool,
}

impl SimulatedSession {
    /// Raise a callback as the engine would.
    pub fn emit(&self, event: NativeEvent) -> bool {
        if let NativeEvent::BitrateChanged(bitrate) = event {
            self.stats.write().current_bitrate = bitrate;
        }
        self.sink.emit(event)
    }

    pub fn emit_state(&self, state: EngineState) -> bool {
        self.emit(NativeEvent::StateChanged(state))
    }

    pub fn attached_devices(&self) -> Vec<DeviceDescriptor> {
        self.attached.lock().clone()
    }

    pub fn is_muted(&self, device_id: &str) -> bool {
        self.muted.lock().contains(device_id)
    }

    pub fn configuration(&self) -> SessionConfiguration {
        self.config.lock().clone()
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn set_transmission_stats(&self, stats: TransmissionStats) {
        *self.stats.write() = stats;
    }

    fn ensure_running(&self) -> NativeResult<()> {
        if self.is_stopped() {
            Err(NativeError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn is_discoverable(&self, device: &DeviceDescriptor) -> bool {
        self.engine.devices.read().contains(device)
    }

    /// Deliver a device result, after the configured latency.
    fn complete(&self, result: NativeResult<DeviceDescriptor>) -> DeviceCompletion {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let delay = *self.engine.device_delay.read();

        if delay.is_zero() {
            let _ = tx.send(result);
        } else {
            thread::spawn(move || {
                thread::sleep(delay);
                let _ = tx.send(result);
            });
        }

        rx
    }
}

impl NativeSession for SimulatedSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&self, endpoint: &Endpoint) -> NativeResult<()> {
        self.ensure_running()?;
        if let Some(message) = self.engine.script.lock().fail_start.take() {
            return Err(NativeError::StartFailed(message));
        }

        info!(id = %self.id, url = %endpoint.url(), "Simulated session connecting");
        *self.endpoint.lock() = Some(endpoint.clone());

        if self.engine.auto_connect.load(Ordering::SeqCst) {
            self.emit_state(EngineState::Connecting);
            self.emit_state(EngineState::Connected);
        }
        Ok(())
    }

    fn reconnect(&self) -> NativeResult<()> {
        self.ensure_running()?;
        if self.endpoint.lock().is_none() {
            return Err(NativeError::ReconnectFailed("session was never started".into()));
        }

        let fail = {
            let mut script = self.engine.script.lock();
            if script.failing_reconnects > 0 {
                script.failing_reconnects -= 1;
                true
            } else {
                false
            }
        };

        debug!(id = %self.id, fail, "Simulated reconnect");
        if self.engine.auto_connect.load(Ordering::SeqCst) || fail {
            self.emit_state(EngineState::Connecting);
            self.emit_state(if fail {
                EngineState::Disconnected
            } else {
                EngineState::Connected
            });
        }
        Ok(())
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.live_sessions.fetch_sub(1, Ordering::SeqCst);
        info!(id = %self.id, "Simulated session stopped");
        self.emit_state(EngineState::Disconnected);
    }

    fn attach_device(&self, device: &DeviceDescriptor) -> DeviceCompletion {
        let result = self.ensure_running().and_then(|()| {
            if !self.is_discoverable(device) {
                return Err(NativeError::DeviceUnavailable(device.id.clone()));
            }
            let mut attached = self.attached.lock();
            if !attached.contains(device) {
                attached.push(device.clone());
            }
            Ok(device.clone())
        });
        self.complete(result)
    }

    fn exchange_device(
        &self,
        old: &DeviceDescriptor,
        new: &DeviceDescriptor,
    ) -> DeviceCompletion {
        let result = self.ensure_running().and_then(|()| {
            if let Some(message) = self.engine.script.lock().fail_exchange.take() {
                return Err(NativeError::ExchangeFailed(message));
            }
            if !self.is_discoverable(new) {
                return Err(NativeError::DeviceUnavailable(new.id.clone()));
            }
            let mut attached = self.attached.lock();
            let slot = attached
                .iter_mut()
                .find(|device| device.id == old.id)
                .ok_or_else(|| NativeError::DeviceUnavailable(old.id.clone()))?;
            *slot = new.clone();
            Ok(new.clone())
        });
        self.complete(result)
    }

    fn set_muted(&self, device: &DeviceDescriptor, muted: bool) -> NativeResult<()> {
        self.ensure_running()?;
        if device.kind != DeviceKind::Microphone || !self.attached.lock().contains(device) {
            return Err(NativeError::DeviceUnavailable(device.id.clone()));
        }

        let mut set = self.muted.lock();
        if muted {
            set.insert(device.id.clone());
        } else {
            set.remove(&device.id);
        }
        Ok(())
    }

    fn update_configuration(&self, config: &SessionConfiguration) -> NativeResult<()> {
        self.ensure_running()?;
        if let Some(message) = self.engine.script.lock().reject_configuration.take() {
            return Err(NativeError::ConfigurationRejected(message));
        }
        *self.config.lock() = config.clone();
        Ok(())
    }

    fn transmission_stats(&self) -> TransmissionStats {
        self.stats.read().clone()
    }

    fn resource_metrics(&self) -> ResourceMetrics {
        ResourceMetrics {
            cpu: 12.5,
            memory: 180.0,
            battery: 100.0,
            temperature: 35.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session(
        engine: &SimulatedEngine,
    ) -> (
        Arc<dyn NativeSession>,
        crossbeam_channel::Receiver<crate::TaggedEvent>,
    ) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let devices = engine.list_devices(DeviceKind::Camera);
        let session = engine
            .create_session(
                &SessionConfiguration::default(),
                &devices[..1],
                EventSink::new(1, tx),
            )
            .unwrap();
        (session, rx)
    }

    #[test]
    fn test_live_session_count() {
        let engine = SimulatedEngine::new();
        let (session, _rx) = open_session(&engine);
        assert_eq!(engine.live_sessions(), 1);

        session.stop();
        session.stop();
        assert_eq!(engine.live_sessions(), 0);
        assert_eq!(engine.sessions_created(), 1);
    }

    #[test]
    fn test_start_emits_connection_states() {
        let engine = SimulatedEngine::new();
        let (session, rx) = open_session(&engine);

        session
            .start(&Endpoint::new("rtmps://ingest.example.com/app", "key").unwrap())
            .unwrap();

        let states: Vec<_> = rx.try_iter().map(|tagged| tagged.event).collect();
        assert_eq!(
            states,
            vec![
                NativeEvent::StateChanged(EngineState::Connecting),
                NativeEvent::StateChanged(EngineState::Connected),
            ]
        );
    }

    #[test]
    fn test_exchange_replaces_attached_device() {
        let engine = SimulatedEngine::new();
        let (session, _rx) = open_session(&engine);
        let cameras = engine.list_devices(DeviceKind::Camera);

        let device = session
            .exchange_device(&cameras[0], &cameras[1])
            .recv()
            .unwrap()
            .unwrap();
        assert_eq!(device.id, "camera-back");

        let err = session
            .exchange_device(&cameras[0], &cameras[1])
            .recv()
            .unwrap()
            .unwrap_err();
        assert_eq!(err, NativeError::DeviceUnavailable("camera-front".into()));
    }

    #[test]
    fn test_scripted_start_failure() {
        let engine = SimulatedEngine::new();
        engine.fail_next_start("no network");
        let (session, _rx) = open_session(&engine);

        let err = session
            .start(&Endpoint::new("rtmps://x", "k").unwrap())
            .unwrap_err();
        assert_eq!(err, NativeError::StartFailed("no network".into()));
    }
}
