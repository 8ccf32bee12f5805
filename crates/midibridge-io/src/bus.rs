//! Event bus: listener table, event queue and dispatch loop.
//!
//! - Backends (midir callback thread, virtual backend) push events through an
//!   [`EventSink`] into an unbounded queue.
//! - One consumer drains the queue, either [`EventBus::pump`] on the caller's
//!   thread or a [`Dispatcher`] thread, and invokes matching callbacks in
//!   emission order.
//!
//! Callbacks for one event are collected under the lock and invoked after
//! releasing it. A detach during delivery therefore affects future events only.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use midibridge_midi::{EventName, EventPayload, Target};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

pub type EventCallback = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Identifies one attached callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    target: Target,
    event: EventName,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn event(&self) -> EventName {
        self.event
    }
}

struct QueuedEvent {
    target: Target,
    event: EventName,
    payload: EventPayload,
}

/// Producer side of the event queue. Clone is cheap.
#[derive(Clone)]
pub struct EventSink {
    sender: Sender<QueuedEvent>,
}

impl EventSink {
    /// Queues an event. Returns false once the bus is gone.
    pub fn emit(&self, target: Target, event: impl Into<EventName>, payload: EventPayload) -> bool {
        self.sender
            .send(QueuedEvent {
                target,
                event: event.into(),
                payload,
            })
            .is_ok()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("queued", &self.sender.len())
            .finish()
    }
}

type ListenerTable = HashMap<(Target, EventName), Vec<(u64, EventCallback)>>;

pub struct EventBus {
    listeners: RwLock<ListenerTable>,
    next_id: AtomicU64,
    sender: Sender<QueuedEvent>,
    receiver: Receiver<QueuedEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sender,
            receiver,
        }
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            sender: self.sender.clone(),
        }
    }

    pub fn attach(
        &self,
        target: Target,
        event: impl Into<EventName>,
        callback: EventCallback,
    ) -> ListenerHandle {
        let event = event.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .entry((target.clone(), event))
            .or_default()
            .push((id, callback));

        debug!("Attached listener {} to {} on {}", id, event, target);
        ListenerHandle { id, target, event }
    }

    /// Returns false if the handle was not attached.
    pub fn detach(&self, handle: &ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let key = (handle.target.clone(), handle.event);
        let Some(callbacks) = listeners.get_mut(&key) else {
            return false;
        };
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != handle.id);
        let removed = callbacks.len() != before;
        if callbacks.is_empty() {
            listeners.remove(&key);
        }
        if removed {
            debug!(
                "Detached listener {} from {} on {}",
                handle.id, handle.event, handle.target
            );
        }
        removed
    }

    pub fn is_attached(&self, handle: &ListenerHandle) -> bool {
        self.listeners
            .read()
            .get(&(handle.target.clone(), handle.event))
            .is_some_and(|callbacks| callbacks.iter().any(|(id, _)| *id == handle.id))
    }

    pub fn listener_count(&self, target: &Target, event: impl Into<EventName>) -> usize {
        self.listeners
            .read()
            .get(&(target.clone(), event.into()))
            .map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }

    /// Detaches every callback. Returns how many were attached.
    pub fn clear(&self) -> usize {
        let mut listeners = self.listeners.write();
        let count = listeners.values().map(Vec::len).sum();
        listeners.clear();
        if count > 0 {
            debug!("Cleared {} listeners", count);
        }
        count
    }

    /// Delivers one event immediately. Returns the number of callbacks invoked.
    pub fn dispatch(&self, target: &Target, event: EventName, payload: &EventPayload) -> usize {
        let callbacks: Vec<EventCallback> = match self.listeners.read().get(&(target.clone(), event))
        {
            Some(callbacks) => callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };
        for callback in &callbacks {
            callback(payload);
        }
        callbacks.len()
    }

    /// Drains the queue on the current thread. Returns the number of events drained.
    pub fn pump(&self) -> usize {
        let mut drained = 0;
        while let Ok(queued) = self.receiver.try_recv() {
            self.dispatch(&queued.target, queued.event, &queued.payload);
            drained += 1;
        }
        drained
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Runs the dispatch loop on a dedicated thread until the returned
    /// [`Dispatcher`] is dropped.
    pub fn spawn_dispatcher(self: &Arc<Self>) -> Result<Dispatcher> {
        let bus = Arc::clone(self);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("midibridge-dispatch".to_string())
            .spawn(move || {
                while running_clone.load(Ordering::Acquire) {
                    match bus.receiver.recv_timeout(Duration::from_millis(100)) {
                        Ok(queued) => {
                            bus.dispatch(&queued.target, queued.event, &queued.payload);
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| Error::MidiDevice(format!("Failed to spawn dispatcher: {e}")))?;

        Ok(Dispatcher {
            running,
            thread: Some(thread),
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.total_listeners())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Background dispatch thread. Stops and joins on drop.
pub struct Dispatcher {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midibridge_midi::{InputEvent, InterfaceEvent};
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, EventCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let callback: EventCallback = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    fn port(id: &str) -> Target {
        Target::Port(id.to_string())
    }

    #[test]
    fn test_attach_and_pump() {
        let bus = EventBus::new();
        let (count, callback) = counter();
        bus.attach(port("a"), InputEvent::NoteOn, callback);

        let sink = bus.sink();
        assert!(sink.emit(port("a"), InputEvent::NoteOn, EventPayload::new(0.0)));
        assert!(sink.emit(port("a"), InputEvent::NoteOff, EventPayload::new(1.0)));
        assert!(sink.emit(port("b"), InputEvent::NoteOn, EventPayload::new(2.0)));

        assert_eq!(bus.pending(), 3);
        assert_eq!(bus.pump(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let bus = EventBus::new();
        let (count, callback) = counter();
        let handle = bus.attach(Target::Interface, InterfaceEvent::Enabled, callback);
        assert!(bus.is_attached(&handle));

        assert!(bus.detach(&handle));
        assert!(!bus.detach(&handle));
        assert!(!bus.is_attached(&handle));

        bus.sink()
            .emit(Target::Interface, InterfaceEvent::Enabled, EventPayload::new(0.0));
        bus.pump();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_delivery_order_is_emission_order() {
        let bus = EventBus::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.attach(
            port("a"),
            InputEvent::NoteOn,
            Arc::new(move |payload| seen_clone.lock().push(payload.timestamp())),
        );

        let sink = bus.sink();
        for t in 0..5 {
            sink.emit(port("a"), InputEvent::NoteOn, EventPayload::new(t as f64));
        }
        bus.pump();
        assert_eq!(*seen.lock(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_detach_during_delivery_completes_in_flight() {
        let bus = Arc::new(EventBus::new());
        let victim: Arc<parking_lot::Mutex<Option<ListenerHandle>>> = Default::default();

        let bus_clone = Arc::clone(&bus);
        let victim_clone = Arc::clone(&victim);
        let first: EventCallback = Arc::new(move |_| {
            if let Some(handle) = victim_clone.lock().take() {
                bus_clone.detach(&handle);
            }
        });
        bus.attach(port("a"), InputEvent::NoteOn, first);

        let (count, second) = counter();
        *victim.lock() = Some(bus.attach(port("a"), InputEvent::NoteOn, second));

        // `second` was already collected for this event
        bus.dispatch(&port("a"), InputEvent::NoteOn.into(), &EventPayload::new(0.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        bus.dispatch(&port("a"), InputEvent::NoteOn.into(), &EventPayload::new(1.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        let (_, a) = counter();
        let (_, b) = counter();
        bus.attach(port("a"), InputEvent::NoteOn, a);
        bus.attach(Target::Interface, InterfaceEvent::PortsChanged, b);
        assert_eq!(bus.total_listeners(), 2);
        assert_eq!(bus.clear(), 2);
        assert_eq!(bus.total_listeners(), 0);
    }

    #[test]
    fn test_dispatcher_thread_delivers() {
        let bus = Arc::new(EventBus::new());
        let (count, callback) = counter();
        bus.attach(port("a"), InputEvent::NoteOn, callback);

        let dispatcher = bus.spawn_dispatcher().unwrap();
        assert!(dispatcher.is_running());
        bus.sink()
            .emit(port("a"), InputEvent::NoteOn, EventPayload::new(0.0));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        drop(dispatcher);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
