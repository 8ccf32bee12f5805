//! In-memory backend with scriptable ports.
//!
//! Ports can be plugged and unplugged, access can be denied, and events or
//! raw MIDI bytes can be injected on any connected port. Nothing is emitted
//! until access has been granted, matching real hardware.

use midibridge_midi::{
    decode_message, EventPayload, InputEvent, InterfaceEvent, PortConnection, PortSnapshot,
    PortState, Target,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::debug;

use super::MidiBackend;
use crate::bus::EventSink;
use crate::error::{Error, Result};

pub struct VirtualBackend {
    ports: RwLock<Vec<PortSnapshot>>,
    sink: RwLock<Option<EventSink>>,
    denial: RwLock<Option<String>>,
    access_requests: AtomicUsize,
    started: Instant,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::with_ports(Vec::new())
    }

    pub fn with_ports(ports: Vec<PortSnapshot>) -> Self {
        Self {
            ports: RwLock::new(ports),
            sink: RwLock::new(None),
            denial: RwLock::new(None),
            access_requests: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    /// Makes every following handshake fail with `PermissionDenied`.
    pub fn deny_access(&self, reason: impl Into<String>) {
        *self.denial.write() = Some(reason.into());
    }

    pub fn grant_access(&self) {
        *self.denial.write() = None;
    }

    /// Number of handshakes attempted so far, successful or not.
    pub fn access_requests(&self) -> usize {
        self.access_requests.load(Ordering::Acquire)
    }

    pub fn has_access(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Milliseconds since the backend was created.
    pub fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Plugs in a port, replacing any port with the same id.
    pub fn connect_port(&self, port: PortSnapshot) {
        {
            let mut ports = self.ports.write();
            match ports.iter_mut().find(|p| p.id == port.id) {
                Some(existing) => *existing = port.clone(),
                None => ports.push(port.clone()),
            }
        }
        debug!("Virtual input {:?} connected", port.id);
        self.emit_topology(InterfaceEvent::Connected, &port);
    }

    /// Unplugs a port. Returns false if no port has that id.
    pub fn disconnect_port(&self, id: &str) -> bool {
        let removed = {
            let mut ports = self.ports.write();
            ports
                .iter()
                .position(|p| p.id == id)
                .map(|index| ports.remove(index))
        };
        match removed {
            Some(port) => {
                debug!("Virtual input {:?} disconnected", id);
                let port = port.with_state(PortConnection::Closed, PortState::Disconnected);
                self.emit_topology(InterfaceEvent::Disconnected, &port);
                true
            }
            None => false,
        }
    }

    /// Emits an input event on a connected port.
    ///
    /// Returns false before access is granted or when the port is unknown.
    pub fn emit(&self, port_id: &str, event: InputEvent, payload: EventPayload) -> bool {
        if !self.ports.read().iter().any(|p| p.id == port_id) {
            return false;
        }
        match self.sink.read().as_ref() {
            Some(sink) => sink.emit(Target::Port(port_id.to_string()), event, payload),
            None => false,
        }
    }

    pub fn emit_interface(&self, event: InterfaceEvent, payload: EventPayload) -> bool {
        match self.sink.read().as_ref() {
            Some(sink) => sink.emit(Target::Interface, event, payload),
            None => false,
        }
    }

    /// Feeds raw MIDI bytes into a port. Returns the number of events emitted.
    pub fn send_bytes(&self, port_id: &str, bytes: &[u8]) -> usize {
        let timestamp = self.now();
        decode_message(timestamp, bytes)
            .into_iter()
            .filter(|(event, payload)| match event.as_input() {
                Some(event) => self.emit(port_id, event, payload.clone()),
                None => false,
            })
            .count()
    }

    fn emit_topology(&self, event: InterfaceEvent, port: &PortSnapshot) {
        let sink = self.sink.read();
        let Some(sink) = sink.as_ref() else {
            return;
        };
        let timestamp = self.now();
        sink.emit(
            Target::Interface,
            event,
            EventPayload::new(timestamp).with_object("port", port),
        );
        sink.emit(
            Target::Interface,
            InterfaceEvent::PortsChanged,
            EventPayload::new(timestamp),
        );
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiBackend for VirtualBackend {
    fn request_access(&self, sink: EventSink) -> Result<()> {
        self.access_requests.fetch_add(1, Ordering::AcqRel);
        if let Some(reason) = self.denial.read().clone() {
            return Err(Error::PermissionDenied(reason));
        }
        *self.sink.write() = Some(sink);
        Ok(())
    }

    fn inputs(&self) -> Vec<PortSnapshot> {
        self.ports.read().clone()
    }
}

impl std::fmt::Debug for VirtualBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualBackend")
            .field("ports", &self.ports.read().len())
            .field("access", &self.has_access())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use midibridge_midi::EventName;
    use std::sync::Arc;

    fn ports() -> Vec<PortSnapshot> {
        vec![
            PortSnapshot::connected("a", "Keys", "Acme"),
            PortSnapshot::connected("b", "Pads", "Acme"),
        ]
    }

    fn recorder(bus: &EventBus, target: Target, event: impl Into<EventName>) -> Arc<parking_lot::Mutex<Vec<EventPayload>>> {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.attach(
            target,
            event,
            Arc::new(move |payload| seen_clone.lock().push(payload.clone())),
        );
        seen
    }

    #[test]
    fn test_denied_access() {
        let backend = VirtualBackend::with_ports(ports());
        backend.deny_access("user declined");
        let bus = EventBus::new();

        let err = backend.request_access(bus.sink()).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(reason) if reason == "user declined"));
        assert!(!backend.has_access());

        backend.grant_access();
        assert!(backend.request_access(bus.sink()).is_ok());
        assert_eq!(backend.access_requests(), 2);
    }

    #[test]
    fn test_nothing_emitted_before_access() {
        let backend = VirtualBackend::with_ports(ports());
        let bus = EventBus::new();
        assert!(!backend.emit("a", InputEvent::NoteOn, EventPayload::new(0.0)));
        backend.connect_port(PortSnapshot::connected("c", "Extra", "Acme"));
        assert_eq!(bus.pending(), 0);
        assert_eq!(backend.inputs().len(), 3);
    }

    #[test]
    fn test_topology_events() {
        let backend = VirtualBackend::with_ports(ports());
        let bus = EventBus::new();
        backend.request_access(bus.sink()).unwrap();

        let connected = recorder(&bus, Target::Interface, InterfaceEvent::Connected);
        let disconnected = recorder(&bus, Target::Interface, InterfaceEvent::Disconnected);
        let changed = recorder(&bus, Target::Interface, InterfaceEvent::PortsChanged);

        backend.connect_port(PortSnapshot::connected("c", "Extra", "Acme"));
        assert!(backend.disconnect_port("a"));
        assert!(!backend.disconnect_port("a"));
        bus.pump();

        assert_eq!(connected.lock()[0].get("port").unwrap()["id"], "c");
        assert_eq!(
            disconnected.lock()[0].get("port").unwrap()["state"],
            "disconnected"
        );
        assert_eq!(changed.lock().len(), 2);

        let ids: Vec<String> = backend.inputs().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_send_bytes_decodes() {
        let backend = VirtualBackend::with_ports(ports());
        let bus = EventBus::new();
        backend.request_access(bus.sink()).unwrap();
        let notes = recorder(&bus, Target::Port("a".into()), InputEvent::NoteOn);

        // midimessage + noteon
        assert_eq!(backend.send_bytes("a", &[0x90, 60, 100]), 2);
        assert_eq!(backend.send_bytes("missing", &[0x90, 60, 100]), 0);
        bus.pump();

        let notes = notes.lock();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].get("note").unwrap()["identifier"], "C4");
    }
}
