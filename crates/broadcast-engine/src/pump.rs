//! Engine event pump and reconnection driver.
//!
//! Engine callbacks and reconnect deadlines are both handled here, under
//! the controller lock. The pending reconnect lives in controller state, so
//! clearing it there cancels the attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver};
use tracing::{debug, info, trace, warn};

use broadcast_ipc::{BroadcastEvent, EngineState, SessionState};
use broadcast_native::{NativeEvent, TaggedEvent};

use crate::controller::{Control, ControllerState, PendingRetry, Shared};
use crate::reconnect::ReconnectPolicy;

/// Cap for retry intervals too large to add to the clock.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) fn run(shared: Arc<Shared>, native_rx: Receiver<TaggedEvent>, control_rx: Receiver<Control>) {
    debug!("Event pump starting");

    loop {
        let retry_timer = match shared.state.lock().pending_retry {
            Some(retry) => crossbeam_channel::at(retry.deadline),
            None => crossbeam_channel::never(),
        };

        select! {
            recv(native_rx) -> tagged => match tagged {
                Ok(tagged) => shared.handle_native(tagged),
                Err(_) => break,
            },
            recv(control_rx) -> control => match control {
                Ok(Control::Shutdown) | Err(_) => break,
            },
            recv(retry_timer) -> _ => shared.handle_retry(),
        }
    }

    debug!("Event pump stopped");
}

impl Shared {
    fn handle_native(&self, tagged: TaggedEvent) {
        let mut state = self.state.lock();
        if !state.is_current(tagged.session_tag) {
            trace!(tag = tagged.session_tag, event = ?tagged.event, "Ignoring stale engine event");
            return;
        }

        match tagged.event {
            NativeEvent::StateChanged(engine_state) => self.on_engine_state(&mut state, engine_state),
            NativeEvent::Error {
                message,
                code,
                fatal: true,
            } => self.fail(&mut state, message, &code, None),
            NativeEvent::Error { message, code, .. } => {
                warn!(%message, %code, "Engine error");
                self.dispatcher.publish(BroadcastEvent::Error {
                    message,
                    code,
                    is_fatal: false,
                });
            }
            NativeEvent::DevicesChanged(devices) => {
                debug!(count = devices.len(), "Devices changed");
                self.dispatcher.publish(BroadcastEvent::DeviceChanged { devices });
            }
            NativeEvent::BitrateChanged(bitrate) => {
                self.dispatcher.publish(BroadcastEvent::BitrateChanged { bitrate });
            }
            NativeEvent::NetworkHealthChanged(health) => {
                self.dispatcher.publish(BroadcastEvent::NetworkHealthChanged { health });
            }
            NativeEvent::AudioSessionInterrupted => {
                info!("Audio session interrupted");
                self.dispatcher.publish(BroadcastEvent::AudioInterrupted);
            }
            NativeEvent::AudioSessionResumed => {
                info!("Audio session resumed");
                self.dispatcher.publish(BroadcastEvent::AudioResumed);
            }
        }
    }

    /// Map the engine's state onto the lifecycle. Every mapped state is
    /// republished, even when the lifecycle does not move.
    fn on_engine_state(&self, state: &mut ControllerState, engine_state: EngineState) {
        match engine_state {
            EngineState::Connecting => {
                let current = state.lifecycle.clone();
                self.transition(state, current, Some(engine_state));
            }
            EngineState::Connected => {
                let was_reconnecting = state.lifecycle.is_reconnecting();
                self.transition(state, SessionState::Connected, Some(engine_state));
                if was_reconnecting {
                    info!("Reconnected");
                    self.dispatcher.publish(BroadcastEvent::ReconnectSucceeded);
                }
            }
            EngineState::Disconnected => self.on_disconnected(state, Some(engine_state)),
            EngineState::Invalid | EngineState::Error | EngineState::Other(_) => {
                warn!(state = engine_state.name(), "Unmapped engine state");
                self.dispatcher.publish(BroadcastEvent::EngineStateIgnored {
                    state: engine_state,
                });
            }
        }
    }

    fn on_disconnected(&self, state: &mut ControllerState, engine_state: Option<EngineState>) {
        let policy = state
            .session
            .as_ref()
            .map(|session| (session.generation, session.config.reconnection.clone()));
        let Some((generation, reconnection)) = policy else {
            return;
        };

        match state.lifecycle.clone() {
            SessionState::Starting => self.fail(
                state,
                "Connection lost before the broadcast was established".into(),
                "E_CONNECTION_LOST",
                engine_state,
            ),
            SessionState::Connected => {
                if !ReconnectPolicy::should_retry(0, &reconnection) {
                    self.fail(state, "Connection lost".into(), "E_CONNECTION_LOST", engine_state);
                    return;
                }
                info!("Connection lost, reconnecting");
                self.transition(state, SessionState::Reconnecting { attempt: 0 }, engine_state);
                self.dispatcher.publish(BroadcastEvent::ReconnectStarted);
                Self::schedule_retry(state, generation, 0, ReconnectPolicy::next_delay(0, &reconnection));
            }
            SessionState::Reconnecting { attempt } => {
                let attempt = attempt + 1;
                if !ReconnectPolicy::should_retry(attempt, &reconnection) {
                    self.fail(
                        state,
                        format!("Reconnection failed after {attempt} attempts"),
                        "E_RECONNECT_EXHAUSTED",
                        engine_state,
                    );
                    return;
                }
                debug!(attempt, "Reconnect attempt failed, retrying");
                self.transition(state, SessionState::Reconnecting { attempt }, engine_state);
                Self::schedule_retry(
                    state,
                    generation,
                    attempt,
                    ReconnectPolicy::next_delay(attempt, &reconnection),
                );
            }
            _ => {}
        }
    }

    /// The pending retry's deadline passed. Ignored unless the same session
    /// is still waiting on that exact attempt.
    fn handle_retry(&self) {
        let mut state = self.state.lock();
        let retry = match state.pending_retry {
            Some(retry) if retry.deadline <= Instant::now() => retry,
            _ => return,
        };
        state.pending_retry = None;

        if !state.is_current(retry.generation)
            || state.lifecycle != (SessionState::Reconnecting { attempt: retry.attempt })
        {
            trace!(generation = retry.generation, attempt = retry.attempt, "Ignoring stale retry");
            return;
        }

        let result = match state.active() {
            Ok(session) => session.native.reconnect(),
            Err(_) => return,
        };

        debug!(attempt = retry.attempt, "Reconnect issued");
        if let Err(err) = result {
            warn!(%err, attempt = retry.attempt, "Reconnect call failed");
            self.dispatcher.publish(BroadcastEvent::Error {
                message: err.to_string(),
                code: "E_RECONNECT_FAILED".into(),
                is_fatal: false,
            });
            self.on_disconnected(&mut state, None);
        }
    }

    fn schedule_retry(state: &mut ControllerState, generation: u64, attempt: u32, delay: Duration) {
        trace!(generation, attempt, ?delay, "Retry scheduled");
        let now = Instant::now();
        state.pending_retry = Some(PendingRetry {
            deadline: now.checked_add(delay).unwrap_or(now + MAX_RETRY_DELAY),
            generation,
            attempt,
        });
    }
}
