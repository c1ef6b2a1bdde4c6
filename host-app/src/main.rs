//! Broadcast host.
//!
//! Reads one JSON `HostCommand` per line on stdin, runs it against a
//! controller backed by the simulated engine, and writes one JSON response
//! per command to stdout. Controller events are written to stdout as they
//! arrive. Logs go to stderr.

mod commands;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broadcast_engine::{create_controller, EventListener};
use broadcast_ipc::{command_channel, event_channel, BroadcastEvent, HostCommand};
use broadcast_native::SimulatedEngine;

use commands::CommandError;

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "broadcast_host=debug,broadcast_engine=debug,broadcast_native=info".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Forwards controller events to the printer thread.
struct EventForwarder {
    tx: Sender<BroadcastEvent>,
}

impl EventListener for EventForwarder {
    fn on_event(&self, event: &BroadcastEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Stdout, shared by the response and event writers so lines never interleave.
type Output = Arc<Mutex<io::Stdout>>;

fn write_line(out: &Output, value: &Value) -> io::Result<()> {
    let mut out = out.lock();
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()
}

fn main() -> Result<()> {
    init_logging();
    info!("Broadcast host starting");

    let controller = create_controller(Arc::new(SimulatedEngine::new()));
    let out: Output = Arc::new(Mutex::new(io::stdout()));

    // Events
    let (event_tx, event_rx) = event_channel();
    controller.subscribe(Arc::new(EventForwarder { tx: event_tx }));
    let printer = {
        let out = Arc::clone(&out);
        thread::Builder::new()
            .name("host-events".into())
            .spawn(move || {
                for event in event_rx.iter() {
                    let line = match serde_json::to_value(&event) {
                        Ok(line) => line,
                        Err(err) => {
                            warn!(%err, event = event.name(), "Failed to serialize event");
                            continue;
                        }
                    };
                    if let Err(err) = write_line(&out, &line) {
                        warn!(%err, "Event output closed");
                        break;
                    }
                }
            })
            .context("failed to spawn event printer")?
    };

    // Commands. The reader is detached: it may stay blocked on stdin after
    // a shutdown command.
    let (command_tx, command_rx) = command_channel();
    {
        let out = Arc::clone(&out);
        thread::Builder::new()
            .name("host-stdin".into())
            .spawn(move || read_commands(command_tx, &out))
            .context("failed to spawn stdin reader")?;
    }

    for command in command_rx.iter() {
        let method = command.method();
        if matches!(command, HostCommand::Shutdown) {
            write_line(&out, &commands::response(Some(method), Ok(Value::Null)))?;
            break;
        }

        debug!(method, "Handling command");
        let result = commands::dispatch(&controller, command);
        if let Err(err) = &result {
            debug!(method, code = %err.code, "Command failed");
        }
        write_line(&out, &commands::response(Some(method), result))?;
    }

    info!("Broadcast host shutting down");
    drop(controller);
    printer
        .join()
        .map_err(|_| anyhow!("event printer panicked"))?;

    Ok(())
}

fn read_commands(command_tx: Sender<HostCommand>, out: &Output) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "Failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<HostCommand>(&line) {
            Ok(command) => {
                if command_tx.send(command).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(%err, "Rejecting malformed command");
                let error = CommandError::new("E_BAD_REQUEST", err.to_string());
                if write_line(out, &commands::response(None, Err(error))).is_err() {
                    break;
                }
            }
        }
    }
    debug!("Stdin closed");
}
