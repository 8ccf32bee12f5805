//! MidiBridge: the process-scoped context owning the interface and its listeners.

use dashmap::DashMap;
use midibridge_io::{
    Dispatcher, EventBus, EventName, EventTracker, InterfaceManager, LocalModel, MidiBackend,
    ModelDirectory, PropertyPath, StateModel, Subscription, Target, TargetType,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::builder::MidiBridgeBuilder;
use crate::inputs::{Input, InputKey, Inputs};
use crate::Result;

/// A tracker created through the bridge, paired with the model it writes to.
///
/// Clones refer to the same tracker.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    tracker: EventTracker,
    model: Arc<LocalModel>,
}

impl Listener {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &Target {
        self.tracker.subscription().target()
    }

    pub fn event(&self) -> EventName {
        self.tracker.subscription().event()
    }

    /// Tracked property names, in extraction order.
    pub fn property_names(&self) -> Vec<&str> {
        self.tracker
            .subscription()
            .properties()
            .iter()
            .map(PropertyPath::name)
            .collect()
    }

    /// Latest value of a tracked property (or `count` / `timestamp`).
    pub fn get(&self, property: &str) -> Option<Value> {
        self.model.get(property)
    }

    pub fn count(&self) -> u64 {
        self.tracker.event_count()
    }

    /// Pauses or resumes delivery, as a remote peer flipping `enabled` would.
    pub fn set_enabled(&self, enabled: bool) {
        self.model.receive_change("enabled", json!(enabled));
    }

    pub fn is_enabled(&self) -> bool {
        self.tracker.is_enabled()
    }

    pub fn is_attached(&self) -> bool {
        self.tracker.is_attached()
    }

    pub fn tracker(&self) -> &EventTracker {
        &self.tracker
    }

    pub fn model(&self) -> &Arc<LocalModel> {
        &self.model
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("target", self.target())
            .field("event", &self.event())
            .field("count", &self.count())
            .finish()
    }
}

/// Selects listeners by target and/or event. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerFilter {
    target: Option<Target>,
    event: Option<EventName>,
}

impl ListenerFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn event(mut self, event: impl Into<EventName>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn matches(&self, listener: &Listener) -> bool {
        self.target.as_ref().is_none_or(|t| t == listener.target())
            && self.event.is_none_or(|e| e == listener.event())
    }
}

/// State shared between the bridge and the input views it hands out.
pub(crate) struct Shared {
    pub(crate) manager: Arc<InterfaceManager>,
    pub(crate) directory: Arc<ModelDirectory>,
    listeners: DashMap<u64, Listener>,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(manager: Arc<InterfaceManager>, directory: Arc<ModelDirectory>) -> Self {
        Self {
            manager,
            directory,
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Starts a tracker bound to a fresh model registered in the directory.
    pub(crate) fn track(&self, subscription: Subscription) -> Result<Listener> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let model = LocalModel::shared(format!("listener-{id}"));
        let tracker = EventTracker::new(
            Arc::clone(&self.manager),
            Arc::clone(&model) as Arc<dyn StateModel>,
            subscription,
        );
        tracker.start()?;

        self.directory
            .insert(Arc::clone(&model) as Arc<dyn StateModel>);
        let listener = Listener { id, tracker, model };
        self.listeners.insert(id, listener.clone());
        debug!("Listener {} tracking {} on {}", id, listener.event(), listener.target());
        Ok(listener)
    }

    fn close(&self, id: u64) -> bool {
        let Some((_, listener)) = self.listeners.remove(&id) else {
            return false;
        };
        listener.tracker.stop();
        listener.model.destroy();
        self.directory.remove(listener.model.id());
        debug!("Listener {} closed", id);
        true
    }
}

/// Owns the interface manager, the optional dispatcher thread and every
/// listener created through it.
///
/// # Example
///
/// ```ignore
/// use midibridge::prelude::*;
///
/// let bridge = MidiBridge::builder().hardware().dispatch_thread().build()?;
/// bridge.enable()?;
///
/// let keys = bridge.input("Keys")?;
/// let notes = keys.track("noteon", &["note_identifier", "value"])?;
/// // ... later
/// println!("{:?} after {} notes", notes.get("note_identifier"), notes.count());
/// ```
pub struct MidiBridge {
    shared: Arc<Shared>,
    dispatcher: Option<Dispatcher>,
}

impl MidiBridge {
    pub fn builder() -> MidiBridgeBuilder {
        MidiBridgeBuilder::default()
    }

    pub(crate) fn from_parts(shared: Arc<Shared>, dispatcher: Option<Dispatcher>) -> Self {
        Self { shared, dispatcher }
    }

    /// Requests MIDI access. Idempotent once it succeeded.
    pub fn enable(&self) -> Result<()> {
        self.shared.manager.enable()?;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.manager.is_enabled()
    }

    /// Resets the interface: every listener is closed, all attachments are
    /// dropped, and MIDI must be enabled again.
    pub fn initialize(&self) {
        self.close_all();
        self.shared.manager.initialize();
    }

    /// Live view of the connected inputs. Fails with `NotEnabled` before
    /// [`enable`](Self::enable).
    pub fn inputs(&self) -> Result<Inputs> {
        Inputs::new(Arc::clone(&self.shared))
    }

    /// Shorthand for `inputs()?.get(key)`.
    pub fn input(&self, key: impl Into<InputKey>) -> Result<Input> {
        self.inputs()?.get(key)
    }

    /// Events available on `target_type` with the properties each can supply.
    pub fn events(&self, target_type: TargetType) -> Vec<(EventName, &'static [&'static str])> {
        EventName::catalogue(target_type)
    }

    /// Tracks an interface event. An empty `properties` tracks everything
    /// the event declares.
    pub fn track_interface(&self, event: &str, properties: &[&str]) -> Result<Listener> {
        let mut builder = Subscription::interface(event);
        if !properties.is_empty() {
            builder = builder.properties(properties.iter().copied());
        }
        self.track(builder.build()?)
    }

    pub fn track(&self, subscription: Subscription) -> Result<Listener> {
        self.shared.track(subscription)
    }

    /// Live listeners matching `filter`, oldest first.
    pub fn listeners(&self, filter: &ListenerFilter) -> Vec<Listener> {
        let mut listeners: Vec<Listener> = self
            .shared
            .listeners
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        listeners.sort_by_key(Listener::id);
        listeners
    }

    /// Stops listener `id` and tears down its model. Unknown ids return false.
    pub fn close(&self, id: u64) -> bool {
        self.shared.close(id)
    }

    /// Closes every listener. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let ids: Vec<u64> = self.shared.listeners.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.shared.close(*id)).count()
    }

    /// Makes `model` addressable by `event_model_id` in remote commands.
    pub fn register_model(&self, model: Arc<dyn StateModel>) {
        self.shared.directory.insert(model);
    }

    /// Feeds one message from the interface's command channel.
    pub fn handle_message(&self, message: &Value) -> Result<()> {
        self.shared.manager.handle_message(message)?;
        Ok(())
    }

    /// Delivers queued events on this thread. A no-op with a dispatcher thread
    /// running, since that thread drains the queue first.
    pub fn pump(&self) -> usize {
        self.shared.manager.bus().pump()
    }

    pub fn has_dispatcher(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(Dispatcher::is_running)
    }

    pub fn interface(&self) -> &Arc<InterfaceManager> {
        &self.shared.manager
    }

    pub fn interface_model(&self) -> &Arc<dyn StateModel> {
        self.shared.manager.model()
    }

    pub fn backend(&self) -> &Arc<dyn MidiBackend> {
        self.shared.manager.backend()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        self.shared.manager.bus()
    }

    pub fn models(&self) -> &Arc<ModelDirectory> {
        &self.shared.directory
    }
}

impl std::fmt::Debug for MidiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBridge")
            .field("interface", &self.shared.manager)
            .field("listeners", &self.shared.listeners.len())
            .field("dispatcher", &self.has_dispatcher())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midibridge_io::{InputEvent, InterfaceEvent, ModelResolver, PortSnapshot, VirtualBackend};

    fn bridge() -> (Arc<VirtualBackend>, MidiBridge) {
        let backend = Arc::new(VirtualBackend::with_ports(vec![
            PortSnapshot::connected("a", "Keys", "Acme"),
            PortSnapshot::connected("b", "Pads", "Acme"),
        ]));
        let bridge = MidiBridge::builder()
            .backend(Arc::clone(&backend) as Arc<dyn MidiBackend>)
            .build()
            .unwrap();
        (backend, bridge)
    }

    #[test]
    fn test_filter_listeners() {
        let (_, bridge) = bridge();
        bridge.enable().unwrap();
        let a = bridge.input("a").unwrap();
        let b = bridge.input("b").unwrap();
        a.track("noteon", &[]).unwrap();
        a.track("noteoff", &[]).unwrap();
        b.track("noteon", &[]).unwrap();
        bridge.track_interface("portschanged", &[]).unwrap();

        assert_eq!(bridge.listeners(&ListenerFilter::any()).len(), 4);
        assert_eq!(
            bridge
                .listeners(&ListenerFilter::any().event(InputEvent::NoteOn))
                .len(),
            2
        );
        assert_eq!(
            bridge
                .listeners(&ListenerFilter::any().target(Target::Port("a".into())))
                .len(),
            2
        );
        let interface = bridge.listeners(
            &ListenerFilter::any()
                .target(Target::Interface)
                .event(InterfaceEvent::PortsChanged),
        );
        assert_eq!(interface.len(), 1);
        assert_eq!(interface[0].property_names()[..2], ["timestamp", "port_id"]);
    }

    #[test]
    fn test_close_detaches_and_forgets() {
        let (backend, bridge) = bridge();
        bridge.enable().unwrap();
        let listener = bridge.input("a").unwrap().track("noteon", &["value"]).unwrap();
        assert!(bridge.models().resolve(listener.model().id()).is_some());

        assert!(bridge.close(listener.id()));
        assert!(!bridge.close(listener.id()));
        assert!(!listener.is_attached());
        assert!(listener.model().is_destroyed());
        assert!(bridge.models().resolve(listener.model().id()).is_none());

        backend.send_bytes("a", &[0x90, 60, 100]);
        bridge.pump();
        assert_eq!(listener.count(), 0);
    }

    #[test]
    fn test_close_all() {
        let (_, bridge) = bridge();
        bridge.enable().unwrap();
        bridge.track_interface("connected", &[]).unwrap();
        bridge.track_interface("disconnected", &["port_id"]).unwrap();

        assert_eq!(bridge.close_all(), 2);
        assert!(bridge.listeners(&ListenerFilter::any()).is_empty());
        assert_eq!(bridge.bus().total_listeners(), 1); // topology listener
    }

    #[test]
    fn test_set_enabled_through_model() {
        let (backend, bridge) = bridge();
        bridge.enable().unwrap();
        let listener = bridge.input("a").unwrap().track("noteon", &[]).unwrap();

        listener.set_enabled(false);
        assert!(!listener.is_attached());
        backend.send_bytes("a", &[0x90, 60, 100]);
        bridge.pump();
        assert_eq!(listener.count(), 0);

        listener.set_enabled(true);
        backend.send_bytes("a", &[0x90, 60, 100]);
        bridge.pump();
        assert_eq!(listener.count(), 1);
        assert_eq!(listener.get("note_identifier"), Some(json!("C4")));
    }

    #[test]
    fn test_remote_listener_targets_tracker_model() {
        let (backend, bridge) = bridge();
        bridge.enable().unwrap();
        let listener = bridge.input("a").unwrap().track("noteoff", &[]).unwrap();
        let model_id = listener.model().id().to_string();

        bridge
            .handle_message(&json!({
                "action": "add_listener",
                "args": {
                    "target_type": "input",
                    "target_id": "b",
                    "event_model_id": model_id,
                    "event_name": "controlchange",
                    "event_id": "knob",
                }
            }))
            .unwrap();

        backend.send_bytes("b", &[0xB0, 1, 127]);
        bridge.pump();
        assert_eq!(listener.get("value"), Some(json!(1.0)));
    }
}
