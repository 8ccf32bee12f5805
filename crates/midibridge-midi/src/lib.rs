//! MIDI event types for midibridge.
//!
//! Pure value types shared by the synchronization core:
//!
//! - **Event catalogue**: interface-level and input-level event names, each with
//!   the property paths it can supply
//! - **Payloads**: camelCase event objects built from raw MIDI bytes
//! - **Property paths**: snake_case paths mapped onto payload fields
//! - **Port snapshots**: descriptive attributes of one discovered input
//!
//! # Example
//!
//! ```ignore
//! use midibridge_midi::{decode_message, EventName, PropertyPath, TargetType};
//!
//! let name = EventName::parse(TargetType::Port, "noteon")?;
//! let path = PropertyPath::parse("note_identifier");
//!
//! for (event, payload) in decode_message(12.5, &[0x90, 60, 100]) {
//!     if event == name {
//!         assert_eq!(payload.extract(&path), "C4");
//!     }
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

pub(crate) mod event;
pub use event::{EventName, InputEvent, InterfaceEvent, Target, TargetType};

pub(crate) mod payload;
pub use payload::EventPayload;

pub(crate) mod property;
pub use property::{PathScope, PropertyPath};

pub(crate) mod message;
pub use message::decode_message;

pub(crate) mod note;
pub use note::Note;

pub(crate) mod port;
pub use port::{PortConnection, PortSnapshot, PortState};

pub(crate) mod utils;
pub use utils::{bend_to_value, controller_name, velocity_to_value};
