//! `midir` backend.
//!
//! midir has no hot-plug notification, so a watcher thread polls the input
//! list every `poll_interval`, opens new ports, drops vanished ones and
//! publishes the resulting topology events. Connections live on the watcher
//! thread only; their callbacks decode bytes and push them into the sink.

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use midibridge_midi::{
    decode_message, EventPayload, InterfaceEvent, PortConnection, PortSnapshot, PortState, Target,
};
use midir::{Ignore, MidiInput, MidiInputConnection};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::MidiBackend;
use crate::bus::EventSink;
use crate::error::{Error, Result};

enum WatcherCommand {
    Rescan,
    Shutdown,
}

struct Watcher {
    command_sender: Sender<WatcherCommand>,
    thread: Option<JoinHandle<()>>,
}

struct WatchedPort {
    snapshot: PortSnapshot,
    connection: Option<MidiInputConnection<()>>,
}

pub struct MidirBackend {
    client_name: String,
    poll_interval: Duration,
    inputs: Arc<ArcSwap<Vec<PortSnapshot>>>,
    watcher: Mutex<Option<Watcher>>,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            client_name: client_name.into(),
            poll_interval,
            inputs: Arc::new(ArcSwap::from_pointee(Vec::new())),
            watcher: Mutex::new(None),
        }
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Asks the watcher to poll now instead of waiting for the next tick.
    pub fn rescan(&self) {
        if let Some(watcher) = self.watcher.lock().as_ref() {
            let _ = watcher.command_sender.send(WatcherCommand::Rescan);
        }
    }

    fn watcher_thread(
        client_name: String,
        poll_interval: Duration,
        sink: EventSink,
        inputs: Arc<ArcSwap<Vec<PortSnapshot>>>,
        command_receiver: Receiver<WatcherCommand>,
        ready: Sender<()>,
    ) {
        let started = Instant::now();
        let mut ports: Vec<WatchedPort> = Vec::new();

        // The ports present at startup are the initial topology, not a change.
        Self::sync_ports(&client_name, &sink, &mut ports, None);
        inputs.store(Arc::new(Self::snapshots(&ports)));
        let _ = ready.send(());

        loop {
            match command_receiver.recv_timeout(poll_interval) {
                Ok(WatcherCommand::Rescan) | Err(RecvTimeoutError::Timeout) => {
                    let now = started.elapsed().as_secs_f64() * 1000.0;
                    if Self::sync_ports(&client_name, &sink, &mut ports, Some(now)) {
                        inputs.store(Arc::new(Self::snapshots(&ports)));
                        sink.emit(
                            Target::Interface,
                            InterfaceEvent::PortsChanged,
                            EventPayload::new(now),
                        );
                    }
                }
                Ok(WatcherCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Dropping the connections closes them.
        ports.clear();
        debug!("MIDI watcher stopped");
    }

    /// Reconciles `ports` with the platform's input list.
    ///
    /// Emits `connected`/`disconnected` for each change when `timestamp` is
    /// set. Returns whether anything changed.
    fn sync_ports(
        client_name: &str,
        sink: &EventSink,
        ports: &mut Vec<WatchedPort>,
        timestamp: Option<f64>,
    ) -> bool {
        let midi_in = match MidiInput::new(client_name) {
            Ok(midi_in) => midi_in,
            Err(e) => {
                warn!("MIDI input enumeration failed: {}", e);
                return false;
            }
        };
        let names: Vec<String> = midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Input {}", index))
            })
            .collect();
        let ids = assign_port_ids(&names);

        let mut changed = false;
        let mut previous = std::mem::take(ports);

        for vanished in previous.iter().filter(|p| !ids.contains(&p.snapshot.id)) {
            info!("MIDI input {:?} disconnected", vanished.snapshot.id);
            changed = true;
            if let Some(timestamp) = timestamp {
                let snapshot = vanished
                    .snapshot
                    .clone()
                    .with_state(PortConnection::Closed, PortState::Disconnected);
                sink.emit(
                    Target::Interface,
                    InterfaceEvent::Disconnected,
                    EventPayload::new(timestamp).with_object("port", &snapshot),
                );
            }
        }

        for (index, (id, name)) in ids.iter().zip(&names).enumerate() {
            if let Some(position) = previous.iter().position(|p| &p.snapshot.id == id) {
                ports.push(previous.swap_remove(position));
                continue;
            }

            let connection = match Self::open_port(client_name, index, name, id, sink.clone()) {
                Ok(connection) => Some(connection),
                Err(e) => {
                    warn!("Failed to open MIDI input {:?}: {}", id, e);
                    None
                }
            };
            let snapshot = PortSnapshot::connected(id.clone(), name.clone(), String::new())
                .with_state(
                    if connection.is_some() {
                        PortConnection::Open
                    } else {
                        PortConnection::Closed
                    },
                    PortState::Connected,
                );
            info!("MIDI input {:?} connected", id);
            changed = true;
            if let Some(timestamp) = timestamp {
                sink.emit(
                    Target::Interface,
                    InterfaceEvent::Connected,
                    EventPayload::new(timestamp).with_object("port", &snapshot),
                );
            }
            ports.push(WatchedPort {
                snapshot,
                connection,
            });
        }

        changed
    }

    /// Opens input `index` on a fresh client; `connect` consumes the client.
    fn open_port(
        client_name: &str,
        index: usize,
        name: &str,
        id: &str,
        sink: EventSink,
    ) -> Result<MidiInputConnection<()>> {
        let mut midi_in = MidiInput::new(client_name)?;
        midi_in.ignore(Ignore::None);

        let port = midi_in
            .ports()
            .into_iter()
            .nth(index)
            .filter(|port| midi_in.port_name(port).is_ok_and(|n| n == name))
            .ok_or_else(|| Error::MidiDevice(format!("MIDI input {:?} vanished", id)))?;

        let target = Target::Port(id.to_string());
        let connection = midi_in.connect(
            &port,
            "midibridge-input",
            move |stamp, bytes, _| {
                // midir stamps are microseconds
                for (event, payload) in decode_message(stamp as f64 / 1000.0, bytes) {
                    sink.emit(target.clone(), event, payload);
                }
            },
            (),
        )?;
        Ok(connection)
    }

    fn snapshots(ports: &[WatchedPort]) -> Vec<PortSnapshot> {
        ports.iter().map(|p| p.snapshot.clone()).collect()
    }
}

impl MidiBackend for MidirBackend {
    fn request_access(&self, sink: EventSink) -> Result<()> {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return Ok(());
        }

        // Fails fast when the platform has no MIDI service at all.
        drop(MidiInput::new(&self.client_name)?);

        let (command_sender, command_receiver) = unbounded();
        let (ready_sender, ready_receiver) = bounded(1);
        let client_name = self.client_name.clone();
        let poll_interval = self.poll_interval;
        let inputs = Arc::clone(&self.inputs);

        let thread = thread::Builder::new()
            .name("midibridge-watcher".to_string())
            .spawn(move || {
                Self::watcher_thread(
                    client_name,
                    poll_interval,
                    sink,
                    inputs,
                    command_receiver,
                    ready_sender,
                );
            })
            .map_err(|e| Error::MidiDevice(format!("Failed to spawn MIDI watcher: {e}")))?;

        ready_receiver
            .recv()
            .map_err(|_| Error::PermissionDenied("MIDI watcher exited during startup".into()))?;

        info!(
            "MIDI access granted, {} inputs",
            self.inputs.load().len()
        );
        *watcher = Some(Watcher {
            command_sender,
            thread: Some(thread),
        });
        Ok(())
    }

    fn inputs(&self) -> Vec<PortSnapshot> {
        self.inputs.load().as_ref().clone()
    }
}

impl Drop for MidirBackend {
    fn drop(&mut self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            let _ = watcher.command_sender.send(WatcherCommand::Shutdown);
            if let Some(thread) = watcher.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

impl std::fmt::Debug for MidirBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidirBackend")
            .field("client_name", &self.client_name)
            .field("poll_interval", &self.poll_interval)
            .field("inputs", &self.inputs.load().len())
            .finish()
    }
}

/// Port ids from port names, in enumeration order.
///
/// Repeated names get a `#n` suffix counting from 2, so two identical
/// keyboards become `Keys` and `Keys #2`. The suffix skips any id already
/// taken, including a real port named `Keys #2`.
pub fn assign_port_ids(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut ids: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut id = name.clone();
        let mut n = 1;
        while taken.contains(&id) {
            n += 1;
            id = format!("{} #{}", name, n);
        }
        taken.insert(id.clone());
        ids.push(id);
    }
    ids
}
