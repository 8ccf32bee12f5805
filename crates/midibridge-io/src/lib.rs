//! MIDI synchronization core for midibridge.
//!
//! Bridges hardware MIDI events into observable state models: an interface
//! manager owning the global connection, event trackers bound to one event on
//! one target, and a listener registry for remotely managed listeners.
//!
//! Events flow backend -> [`EventSink`] -> [`EventBus`] queue -> callbacks ->
//! [`StateModel`]. The queue is drained by [`EventBus::pump`] or a
//! [`Dispatcher`] thread.
//!
//! Feature gates: `hardware` (midir backend, on by default).

pub mod error;
pub use error::{Error, Result};

pub mod backend;
#[cfg(feature = "hardware")]
pub use backend::MidirBackend;
pub use backend::{MidiBackend, VirtualBackend};

mod bus;
pub use bus::{Dispatcher, EventBus, EventCallback, EventSink, ListenerHandle};

pub mod command;
pub use command::{AddListenerArgs, Command, RemoveListenerArgs};

mod interface;
pub use interface::{InterfaceManager, InterfaceState};

pub mod model;
pub use model::{LocalModel, ModelDirectory, ModelResolver, StateModel};

mod registry;
pub use registry::{Handles, ListenerRegistry};

mod tracker;
pub use tracker::{EventTracker, Subscription, SubscriptionBuilder};

pub use midibridge_midi::{
    EventName, EventPayload, InputEvent, InterfaceEvent, PortConnection, PortSnapshot, PortState,
    PropertyPath, Target, TargetType,
};
