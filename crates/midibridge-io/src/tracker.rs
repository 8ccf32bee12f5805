//! Event Tracker: one event on one target mirrored into one state model.
//!
//! The tracker owns at most one bus callback. `attached` holds its handle, and
//! every transition checks the handle against the bus before attaching, so a
//! second callback can never exist. A handle that the bus no longer knows
//! (after [`InterfaceManager::initialize`] cleared it) counts as detached.

use midibridge_midi::{EventName, EventPayload, PropertyPath, Target, TargetType};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::bus::ListenerHandle;
use crate::error::Result;
use crate::interface::InterfaceManager;
use crate::model::StateModel;

/// Writes one event into `model`: declared paths in order, then `count` and
/// `timestamp`, then a single save.
pub(crate) fn write_event(
    model: &dyn StateModel,
    paths: &[PropertyPath],
    count: u64,
    payload: &EventPayload,
) {
    for path in paths {
        model.set(path.name(), payload.extract(path));
    }
    model.set("count", json!(count));
    model.set("timestamp", json!(payload.timestamp()));
    model.save();
}

/// What a tracker listens to and which properties it extracts.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    target: Target,
    event: EventName,
    properties: Vec<PropertyPath>,
    enabled: bool,
}

impl Subscription {
    pub fn builder(target_type: TargetType, event_name: impl Into<String>) -> SubscriptionBuilder {
        SubscriptionBuilder {
            target_type,
            target_id: None,
            event_name: event_name.into(),
            properties: None,
            unchecked: false,
            enabled: true,
        }
    }

    /// Shorthand for an interface-level subscription.
    pub fn interface(event_name: impl Into<String>) -> SubscriptionBuilder {
        Self::builder(TargetType::Interface, event_name)
    }

    /// Shorthand for a subscription on input `port_id`.
    pub fn port(port_id: impl Into<String>, event_name: impl Into<String>) -> SubscriptionBuilder {
        Self::builder(TargetType::Port, event_name).target_id(port_id)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn event(&self) -> EventName {
        self.event
    }

    pub fn properties(&self) -> &[PropertyPath] {
        &self.properties
    }

    /// Whether the tracker starts enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

pub struct SubscriptionBuilder {
    target_type: TargetType,
    target_id: Option<String>,
    event_name: String,
    properties: Option<Vec<String>>,
    unchecked: bool,
    enabled: bool,
}

impl SubscriptionBuilder {
    pub fn target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    /// Property paths to extract, in order. Defaults to every path the event declares.
    pub fn properties<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Like [`properties`](Self::properties) but skips validation against the
    /// event kind. Paths the event lacks then read as `null`.
    pub fn unchecked_properties<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unchecked = true;
        self.properties(paths)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> Result<Subscription> {
        let event = EventName::parse(self.target_type, &self.event_name)?;
        let target = Target::from_parts(self.target_type, self.target_id.as_deref())?;
        let properties = match self.properties {
            None => PropertyPath::all_for(event),
            Some(paths) if self.unchecked => paths.iter().map(|p| PropertyPath::parse(p)).collect(),
            Some(paths) => paths
                .iter()
                .map(|p| PropertyPath::for_event(event, p))
                .collect::<midibridge_midi::Result<Vec<_>>>()?,
        };
        Ok(Subscription {
            target,
            event,
            properties,
            enabled: self.enabled,
        })
    }
}

struct TrackerState {
    enabled: bool,
    started: bool,
    attached: Option<ListenerHandle>,
}

struct TrackerInner {
    interface: Arc<InterfaceManager>,
    model: Arc<dyn StateModel>,
    subscription: Subscription,
    state: Mutex<TrackerState>,
    count: AtomicU64,
    hooks_installed: AtomicBool,
}

impl TrackerInner {
    fn attach(self: &Arc<Self>) -> ListenerHandle {
        let weak = Arc::downgrade(self);
        self.interface.bus().attach(
            self.subscription.target.clone(),
            self.subscription.event,
            Arc::new(move |payload| {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver(payload);
                }
            }),
        )
    }

    fn deliver(&self, payload: &EventPayload) {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        write_event(
            self.model.as_ref(),
            &self.subscription.properties,
            count,
            payload,
        );
    }

    fn is_live(&self, state: &TrackerState) -> bool {
        state
            .attached
            .as_ref()
            .is_some_and(|handle| self.interface.bus().is_attached(handle))
    }

    fn set_enabled(self: &Arc<Self>, enabled: bool) {
        let mut state = self.state.lock();
        state.enabled = enabled;
        if enabled {
            if state.started && !self.is_live(&state) {
                state.attached = Some(self.attach());
                debug!("Tracker on {} {} attached", self.subscription.target, self.subscription.event);
            }
        } else if let Some(handle) = state.attached.take() {
            self.interface.bus().detach(&handle);
            debug!("Tracker on {} {} detached", self.subscription.target, self.subscription.event);
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.started = false;
        if let Some(handle) = state.attached.take() {
            self.interface.bus().detach(&handle);
        }
    }

    /// Follows the model's `enabled` attribute and stops on model teardown.
    fn install_hooks(self: &Arc<Self>) {
        if self.hooks_installed.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak = Arc::downgrade(self);
        self.model.on_change(
            "enabled",
            Arc::new(move |value| {
                if let (Some(inner), Some(enabled)) = (weak.upgrade(), value.as_bool()) {
                    inner.set_enabled(enabled);
                }
            }),
        );
        let weak = Arc::downgrade(self);
        self.model.on_destroy(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.stop();
            }
        }));
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().attached.take() {
            self.interface.bus().detach(&handle);
        }
    }
}

/// Keeps one subscription's callback attached and publishes its events.
///
/// Clones share the same callback. The callback is detached when the last
/// clone is dropped.
#[derive(Clone)]
pub struct EventTracker {
    inner: Arc<TrackerInner>,
}

impl EventTracker {
    pub fn new(
        interface: Arc<InterfaceManager>,
        model: Arc<dyn StateModel>,
        subscription: Subscription,
    ) -> Self {
        let enabled = subscription.enabled;
        Self {
            inner: Arc::new(TrackerInner {
                interface,
                model,
                subscription,
                state: Mutex::new(TrackerState {
                    enabled,
                    started: false,
                    attached: None,
                }),
                count: AtomicU64::new(0),
                hooks_installed: AtomicBool::new(false),
            }),
        }
    }

    /// Enables the interface, resolves the target and attaches the callback.
    ///
    /// Running it again replaces the previous callback instead of adding a
    /// second one. A port that is not connected fails with `UnknownTarget`
    /// and leaves the tracker detached.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        inner.interface.enable()?;
        inner.interface.check_target(&inner.subscription.target)?;
        inner.install_hooks();

        let mut state = inner.state.lock();
        if let Some(stale) = state.attached.take() {
            inner.interface.bus().detach(&stale);
        }
        state.started = true;
        if state.enabled {
            state.attached = Some(inner.attach());
        }
        debug!(
            "Tracker started on {} {} (enabled: {})",
            inner.subscription.target, inner.subscription.event, state.enabled
        );
        Ok(())
    }

    /// Attaches or detaches the callback. Repeating the current state is a no-op.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.set_enabled(enabled);
    }

    /// Detaches the callback until the next [`start`](Self::start).
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    pub fn is_started(&self) -> bool {
        self.inner.state.lock().started
    }

    pub fn is_attached(&self) -> bool {
        let state = self.inner.state.lock();
        self.inner.is_live(&state)
    }

    /// Events delivered since the tracker was created.
    pub fn event_count(&self) -> u64 {
        self.inner.count.load(Ordering::Acquire)
    }

    pub fn subscription(&self) -> &Subscription {
        &self.inner.subscription
    }

    pub fn model(&self) -> &Arc<dyn StateModel> {
        &self.inner.model
    }
}

impl std::fmt::Debug for EventTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTracker")
            .field("target", &self.inner.subscription.target)
            .field("event", &self.inner.subscription.event)
            .field("attached", &self.is_attached())
            .field("count", &self.event_count())
            .finish()
    }
}
