//! # midibridge - MIDI events mirrored into observable state
//!
//! Hardware MIDI inputs are exposed through a single interface object whose
//! state (`enabled`, `_inputs`) lives in a synchronized model. Listeners
//! subscribe to an event on the interface or on one input and copy selected
//! event properties into their own model, saving once per event.
//!
//! ## Architecture
//!
//! - **midibridge-midi** - Event catalogue, property paths, payloads, port snapshots
//! - **midibridge-io** - Backends, event bus, interface manager, trackers, commands
//! - **midibridge** (this crate) - [`MidiBridge`] context with input views and listener bookkeeping
//!
//! ## Quick Start
//!
//! ```ignore
//! use midibridge::prelude::*;
//!
//! let bridge = MidiBridge::builder().hardware().dispatch_thread().build()?;
//! bridge.enable()?;
//!
//! println!("{}", bridge.inputs()?);
//!
//! let knob = bridge.input(0)?.track("controlchange", &["value", "controller_number"])?;
//! let plugs = bridge.track_interface("connected", &["port_name"])?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Hardware MIDI via midir
//! - `hardware` - [`io::MidirBackend`]; without it only [`io::VirtualBackend`] exists

pub mod error;
pub use error::{Error, Result};

pub use midibridge_io as io;
pub use midibridge_midi as midi;

pub use midibridge_io::{
    EventTracker, InterfaceManager, InterfaceState, LocalModel, MidiBackend, ModelDirectory,
    ModelResolver, StateModel, Subscription, SubscriptionBuilder, VirtualBackend,
};

#[cfg(feature = "hardware")]
pub use midibridge_io::MidirBackend;

pub use midibridge_midi::{
    EventName, EventPayload, InputEvent, InterfaceEvent, PortConnection, PortSnapshot, PortState,
    Target, TargetType,
};

mod bridge;
mod builder;
mod inputs;

pub use bridge::{Listener, ListenerFilter, MidiBridge};
pub use builder::MidiBridgeBuilder;
pub use inputs::{Input, InputKey, Inputs};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{MidiBridge, MidiBridgeBuilder};

    pub use crate::{Input, InputKey, Inputs, Listener, ListenerFilter};

    pub use crate::{
        EventName, InputEvent, InterfaceEvent, PortSnapshot, Subscription, Target, TargetType,
    };

    pub use crate::{LocalModel, MidiBackend, StateModel, VirtualBackend};

    pub use crate::{Error, Result};

    pub use std::sync::Arc;
    pub use std::time::Duration;
}
