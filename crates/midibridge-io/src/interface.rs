//! Interface Manager: owner of the global MIDI connection.
//!
//! One manager exists per bridge. It publishes `enabled` and `_inputs` on the
//! interface state model, keeps exactly one topology listener while enabled,
//! and services the remote command channel.
//!
//! ```text
//! Uninitialized --initialize()--> Initialized --enable()--> Enabled
//!                                      ^                       |
//!                                      +-----initialize()------+
//! ```

use arc_swap::ArcSwap;
use midibridge_midi::{
    EventName, EventPayload, InterfaceEvent, PortSnapshot, PortState, PropertyPath, Target,
    TargetType,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::MidiBackend;
use crate::bus::{EventBus, EventCallback, ListenerHandle};
use crate::command::{AddListenerArgs, Command, RemoveListenerArgs};
use crate::error::{Error, Result};
use crate::model::{ModelResolver, StateModel};
use crate::registry::ListenerRegistry;
use crate::tracker::write_event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Uninitialized,
    Initialized,
    Enabled,
}

struct ManagerState {
    phase: InterfaceState,
    topology: Option<ListenerHandle>,
}

pub struct InterfaceManager {
    backend: Arc<dyn MidiBackend>,
    bus: Arc<EventBus>,
    registry: ListenerRegistry,
    model: Arc<dyn StateModel>,
    models: Arc<dyn ModelResolver>,
    state: Mutex<ManagerState>,
    /// Serializes handshakes; concurrent callers wait for the one in flight.
    enable_lock: Mutex<()>,
    inputs: ArcSwap<Vec<PortSnapshot>>,
    started: Instant,
}

impl InterfaceManager {
    pub fn new(
        backend: Arc<dyn MidiBackend>,
        model: Arc<dyn StateModel>,
        models: Arc<dyn ModelResolver>,
    ) -> Self {
        Self::with_bus(backend, Arc::new(EventBus::new()), model, models)
    }

    pub fn with_bus(
        backend: Arc<dyn MidiBackend>,
        bus: Arc<EventBus>,
        model: Arc<dyn StateModel>,
        models: Arc<dyn ModelResolver>,
    ) -> Self {
        Self {
            backend,
            registry: ListenerRegistry::new(Arc::clone(&bus)),
            bus,
            model,
            models,
            state: Mutex::new(ManagerState {
                phase: InterfaceState::Uninitialized,
                topology: None,
            }),
            enable_lock: Mutex::new(()),
            inputs: ArcSwap::from_pointee(Vec::new()),
            started: Instant::now(),
        }
    }

    /// Resets to a clean slate.
    ///
    /// Removes every remote listener and every bus attachment (including the
    /// topology listener and tracker callbacks), publishes `enabled=false` and
    /// takes over the model's command channel. An enabled manager must be
    /// enabled again afterwards.
    pub fn initialize(self: &Arc<Self>) {
        let _guard = self.enable_lock.lock();
        self.reset();
    }

    fn reset(self: &Arc<Self>) {
        // Listeners attached right now see `disabled`; nothing is left queued
        // for listeners attached after the reset.
        if self.is_enabled() {
            self.bus.dispatch(
                &Target::Interface,
                InterfaceEvent::Disabled.into(),
                &EventPayload::new(self.now()),
            );
        }

        let removed = self.registry.clear();
        let detached = self.bus.clear();
        {
            let mut state = self.state.lock();
            state.topology = None;
            state.phase = InterfaceState::Initialized;
        }

        self.inputs.store(Arc::new(Vec::new()));
        self.model.set("enabled", json!(false));
        self.model.set("_inputs", json!([]));
        self.model.save();

        let weak = Arc::downgrade(self);
        self.model.on_custom_message(Arc::new(move |message| match weak.upgrade() {
            Some(manager) => manager.handle_message(message),
            None => Ok(()),
        }));

        info!(
            "MIDI interface initialized ({} remote listeners, {} attachments cleared)",
            removed, detached
        );
    }

    /// Runs the access handshake once and publishes the port list.
    ///
    /// A no-op when already enabled. On failure the manager stays
    /// `Initialized` with `enabled=false` and the error is returned; a later
    /// call retries.
    pub fn enable(self: &Arc<Self>) -> Result<()> {
        let _guard = self.enable_lock.lock();
        match self.state() {
            InterfaceState::Enabled => return Ok(()),
            InterfaceState::Uninitialized => self.reset(),
            InterfaceState::Initialized => {}
        }

        if let Err(e) = self.backend.request_access(self.bus.sink()) {
            warn!("MIDI enable failed: {}", e);
            return Err(e);
        }

        let weak = Arc::downgrade(self);
        let topology = self.bus.attach(
            Target::Interface,
            InterfaceEvent::PortsChanged,
            Arc::new(move |_| {
                if let Some(manager) = weak.upgrade() {
                    manager.publish_inputs();
                }
            }),
        );
        {
            let mut state = self.state.lock();
            if let Some(stale) = state.topology.replace(topology) {
                self.bus.detach(&stale);
            }
            state.phase = InterfaceState::Enabled;
        }

        let inputs = self.refresh_inputs();
        self.model.set("enabled", json!(true));
        self.model.set("_inputs", snapshot_value(&inputs));
        self.model.save();

        self.bus.sink().emit(
            Target::Interface,
            InterfaceEvent::Enabled,
            EventPayload::new(self.now()),
        );
        info!("MIDI enabled with {} inputs", inputs.len());
        Ok(())
    }

    /// Resolves a target, checking that a port id names a connected input.
    pub fn resolve_target(&self, target_type: TargetType, target_id: Option<&str>) -> Result<Target> {
        let target = Target::from_parts(target_type, target_id)?;
        self.check_target(&target)?;
        Ok(target)
    }

    pub fn check_target(&self, target: &Target) -> Result<()> {
        let Target::Port(id) = target else {
            return Ok(());
        };
        match self.backend.input_by_id(id) {
            Some(port) if port.state == PortState::Connected => Ok(()),
            _ => Err(Error::UnknownTarget(format!("input {:?}", id))),
        }
    }

    /// Attaches a remote listener keyed by `args.event_id`.
    ///
    /// Everything is validated before attaching, so a failure registers
    /// nothing. A listener already registered under the same id is detached
    /// and replaced.
    pub fn add_listener(self: &Arc<Self>, args: AddListenerArgs) -> Result<()> {
        self.enable()?;

        let event = EventName::parse(args.target_type, &args.event_name)?;
        let target = self.resolve_target(args.target_type, args.target_id.as_deref())?;
        let model = self
            .models
            .resolve(&args.event_model_id)
            .ok_or_else(|| Error::UnknownTarget(format!("model {:?}", args.event_model_id)))?;
        let paths = listener_paths(event, &args.event_props)?;

        let count = AtomicU64::new(0);
        let callback: EventCallback = Arc::new(move |payload| {
            let count = count.fetch_add(1, Ordering::AcqRel) + 1;
            write_event(model.as_ref(), &paths, count, payload);
        });
        let handle = self.bus.attach(target, event, callback);
        self.registry.register(&args.event_id, [handle]);
        debug!("Remote listener {:?} added for {}", args.event_id, event);
        Ok(())
    }

    /// Detaches the listener registered under `args.event_id`, if any.
    pub fn remove_listener(&self, args: RemoveListenerArgs) -> bool {
        self.registry.unregister(&args.event_id)
    }

    pub fn handle_command(self: &Arc<Self>, command: Command) -> Result<()> {
        debug!("Handling {} command", command.action());
        match command {
            Command::Enable => self.enable(),
            Command::AddListener(args) => self.add_listener(args),
            Command::RemoveListener(args) => {
                self.remove_listener(args);
                Ok(())
            }
        }
    }

    /// Decodes and runs one message from the custom-message channel.
    ///
    /// A failure is also sent back on the interface model as
    /// `{"event": "error", "action", "error"}` before being returned.
    pub fn handle_message(self: &Arc<Self>, message: &Value) -> Result<()> {
        let result = Command::from_message(message).and_then(|command| self.handle_command(command));
        if let Err(e) = &result {
            warn!("Command message failed: {}", e);
            let action = message
                .get("action")
                .or_else(|| message.get("command"))
                .cloned()
                .unwrap_or(Value::Null);
            self.model.send(json!({
                "event": "error",
                "action": action,
                "error": e.to_string(),
            }));
        }
        result
    }

    pub fn state(&self) -> InterfaceState {
        self.state.lock().phase
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == InterfaceState::Enabled
    }

    /// The port list as last published.
    pub fn inputs(&self) -> Arc<Vec<PortSnapshot>> {
        self.inputs.load_full()
    }

    pub fn has_topology_listener(&self) -> bool {
        self.state
            .lock()
            .topology
            .as_ref()
            .is_some_and(|handle| self.bus.is_attached(handle))
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn model(&self) -> &Arc<dyn StateModel> {
        &self.model
    }

    pub fn models(&self) -> &Arc<dyn ModelResolver> {
        &self.models
    }

    pub fn backend(&self) -> &Arc<dyn MidiBackend> {
        &self.backend
    }

    fn refresh_inputs(&self) -> Arc<Vec<PortSnapshot>> {
        let inputs = Arc::new(self.backend.inputs());
        self.inputs.store(Arc::clone(&inputs));
        inputs
    }

    fn publish_inputs(&self) {
        let inputs = self.refresh_inputs();
        self.model.set("_inputs", snapshot_value(&inputs));
        self.model.save();
        debug!("Republished {} inputs", inputs.len());
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl std::fmt::Debug for InterfaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceManager")
            .field("state", &self.state())
            .field("inputs", &self.inputs.load().len())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Paths for a remote listener: `value` unless told otherwise.
///
/// Events without a `value` field fall back to everything they declare.
fn listener_paths(event: EventName, props: &[String]) -> Result<Vec<PropertyPath>> {
    if props.is_empty() {
        return Ok(match PropertyPath::for_event(event, "value") {
            Ok(path) => vec![path],
            Err(_) => PropertyPath::all_for(event),
        });
    }
    props
        .iter()
        .map(|prop| PropertyPath::for_event(event, prop).map_err(Error::from))
        .collect()
}

fn snapshot_value(inputs: &[PortSnapshot]) -> Value {
    serde_json::to_value(inputs).unwrap_or_else(|_| json!([]))
}
