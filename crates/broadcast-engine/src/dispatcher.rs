//! Fan-out of controller events to listeners.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use broadcast_ipc::BroadcastEvent;

/// Receives published events on the dispatcher's delivery thread.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &BroadcastEvent);
}

/// Identifies a subscription for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Forwards events into a channel.
struct ChannelListener {
    tx: Sender<BroadcastEvent>,
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &BroadcastEvent) {
        if self.tx.send(event.clone()).is_err() {
            warn!(event = event.name(), "Channel listener is unreachable");
        }
    }
}

type ListenerList = Arc<RwLock<Vec<(ListenerId, Arc<dyn EventListener>)>>>;

/// Publishes events in order to every listener, off the caller's thread.
///
/// `publish` only enqueues; a dedicated thread delivers. The queue is
/// unbounded and its depth is monitored.
pub struct EventDispatcher {
    listeners: ListenerList,
    queue_tx: Mutex<Option<Sender<BroadcastEvent>>>,
    depth: Arc<AtomicUsize>,
    next_id: AtomicU64,
    warn_threshold: usize,
    delivery_thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventDispatcher {
    /// Create a dispatcher and start its delivery thread.
    pub fn new(warn_threshold: usize) -> Self {
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let listeners: ListenerList = Arc::new(RwLock::new(Vec::new()));
        let depth = Arc::new(AtomicUsize::new(0));

        let handle = {
            let listeners = Arc::clone(&listeners);
            let depth = Arc::clone(&depth);
            thread::Builder::new()
                .name("broadcast-events".into())
                .spawn(move || deliver(queue_rx, listeners, depth))
                .ok()
        };
        if handle.is_none() {
            warn!("Failed to spawn event delivery thread");
        }

        Self {
            listeners,
            queue_tx: Mutex::new(Some(queue_tx)),
            depth,
            next_id: AtomicU64::new(1),
            warn_threshold,
            delivery_thread: Mutex::new(handle),
        }
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        debug!(?id, "Listener subscribed");
        id
    }

    /// Register a channel that receives every event from now on.
    pub fn subscribe_channel(&self) -> Receiver<BroadcastEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribe(Arc::new(ChannelListener { tx }));
        rx
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    /// Enqueue an event for delivery.
    pub fn publish(&self, event: BroadcastEvent) {
        let queue = self.queue_tx.lock();
        let Some(tx) = queue.as_ref() else {
            warn!(event = event.name(), "Dispatcher closed, dropping event");
            return;
        };

        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if depth > self.warn_threshold {
            warn!(depth, threshold = self.warn_threshold, "Event queue is backing up");
        }

        trace!(event = event.name(), "Publishing event");
        if tx.send(event).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            warn!("Event delivery thread is gone");
        }
    }

    /// Events enqueued but not yet delivered.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver what is queued, then stop the delivery thread.
    pub fn shutdown(&self) {
        self.queue_tx.lock().take();
        if let Some(handle) = self.delivery_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(queue_rx: Receiver<BroadcastEvent>, listeners: ListenerList, depth: Arc<AtomicUsize>) {
    debug!("Event delivery starting");

    for event in queue_rx.iter() {
        // Snapshot so listeners can (un)subscribe from inside a callback.
        let targets: Vec<Arc<dyn EventListener>> = listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in targets {
            listener.on_event(&event);
        }

        depth.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("Event delivery stopped");
}
