//! Event catalogue: which events exist on which target, and what they carry.
//!
//! Interface-level and input-level events live in disjoint namespaces. A name
//! is only meaningful together with its [`TargetType`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Kind of event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    #[serde(rename = "interface")]
    Interface,
    #[serde(rename = "input", alias = "port")]
    Port,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Interface => "interface",
            TargetType::Port => "input",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete event source: the global interface or one input port by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Interface,
    Port(String),
}

impl Target {
    /// Builds a target from its wire representation.
    ///
    /// A port target needs an id; the interface ignores one if given.
    pub fn from_parts(target_type: TargetType, target_id: Option<&str>) -> Result<Self> {
        match target_type {
            TargetType::Interface => Ok(Target::Interface),
            TargetType::Port => target_id
                .map(|id| Target::Port(id.to_string()))
                .ok_or(Error::MissingTargetId(TargetType::Port)),
        }
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            Target::Interface => TargetType::Interface,
            Target::Port(_) => TargetType::Port,
        }
    }

    pub fn port_id(&self) -> Option<&str> {
        match self {
            Target::Interface => None,
            Target::Port(id) => Some(id),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Interface => f.write_str("interface"),
            Target::Port(id) => write!(f, "input {id:?}"),
        }
    }
}

/// Events fired by the global interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceEvent {
    Connected,
    Disconnected,
    PortsChanged,
    Enabled,
    Disabled,
}

/// Events fired by one input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    NoteOn,
    NoteOff,
    ControlChange,
    KeyAftertouch,
    ChannelAftertouch,
    ProgramChange,
    PitchBend,
    MidiMessage,
}

const PORT_PROPS: &[&str] = &[
    "timestamp",
    "port_id",
    "port_name",
    "port_manufacturer",
    "port_connection",
    "port_state",
];

const STATUS_PROPS: &[&str] = &["timestamp"];

const NOTE_PROPS: &[&str] = &[
    "timestamp",
    "channel",
    "value",
    "raw_value",
    "note_number",
    "note_identifier",
    "note_name",
    "note_accidental",
    "note_octave",
    "note_attack",
    "note_release",
    "note_raw_attack",
    "note_raw_release",
];

const KEY_AFTERTOUCH_PROPS: &[&str] = &[
    "timestamp",
    "channel",
    "value",
    "raw_value",
    "note_number",
    "note_identifier",
    "note_name",
    "note_accidental",
    "note_octave",
];

const CONTROL_PROPS: &[&str] = &[
    "timestamp",
    "channel",
    "value",
    "raw_value",
    "controller_number",
    "controller_name",
];

const CHANNEL_VALUE_PROPS: &[&str] = &["timestamp", "channel", "value", "raw_value"];

const MESSAGE_PROPS: &[&str] = &["timestamp", "data", "status_byte", "data_bytes"];

impl InterfaceEvent {
    pub const ALL: [InterfaceEvent; 5] = [
        InterfaceEvent::Connected,
        InterfaceEvent::Disconnected,
        InterfaceEvent::PortsChanged,
        InterfaceEvent::Enabled,
        InterfaceEvent::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceEvent::Connected => "connected",
            InterfaceEvent::Disconnected => "disconnected",
            InterfaceEvent::PortsChanged => "portschanged",
            InterfaceEvent::Enabled => "enabled",
            InterfaceEvent::Disabled => "disabled",
        }
    }

    pub fn properties(&self) -> &'static [&'static str] {
        match self {
            InterfaceEvent::Connected
            | InterfaceEvent::Disconnected
            | InterfaceEvent::PortsChanged => PORT_PROPS,
            InterfaceEvent::Enabled | InterfaceEvent::Disabled => STATUS_PROPS,
        }
    }
}

impl InputEvent {
    pub const ALL: [InputEvent; 8] = [
        InputEvent::NoteOn,
        InputEvent::NoteOff,
        InputEvent::ControlChange,
        InputEvent::KeyAftertouch,
        InputEvent::ChannelAftertouch,
        InputEvent::ProgramChange,
        InputEvent::PitchBend,
        InputEvent::MidiMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputEvent::NoteOn => "noteon",
            InputEvent::NoteOff => "noteoff",
            InputEvent::ControlChange => "controlchange",
            InputEvent::KeyAftertouch => "keyaftertouch",
            InputEvent::ChannelAftertouch => "channelaftertouch",
            InputEvent::ProgramChange => "programchange",
            InputEvent::PitchBend => "pitchbend",
            InputEvent::MidiMessage => "midimessage",
        }
    }

    pub fn properties(&self) -> &'static [&'static str] {
        match self {
            InputEvent::NoteOn | InputEvent::NoteOff => NOTE_PROPS,
            InputEvent::KeyAftertouch => KEY_AFTERTOUCH_PROPS,
            InputEvent::ControlChange => CONTROL_PROPS,
            InputEvent::ChannelAftertouch | InputEvent::ProgramChange | InputEvent::PitchBend => {
                CHANNEL_VALUE_PROPS
            }
            InputEvent::MidiMessage => MESSAGE_PROPS,
        }
    }
}

/// An event name resolved against its target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Interface(InterfaceEvent),
    Input(InputEvent),
}

impl EventName {
    /// Resolves `name` in the namespace of `target_type`.
    pub fn parse(target_type: TargetType, name: &str) -> Result<Self> {
        let found = match target_type {
            TargetType::Interface => InterfaceEvent::ALL
                .into_iter()
                .find(|e| e.as_str() == name)
                .map(EventName::Interface),
            TargetType::Port => InputEvent::ALL
                .into_iter()
                .find(|e| e.as_str() == name)
                .map(EventName::Input),
        };
        found.ok_or_else(|| Error::UnsupportedEvent {
            target_type,
            event: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Interface(e) => e.as_str(),
            EventName::Input(e) => e.as_str(),
        }
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            EventName::Interface(_) => TargetType::Interface,
            EventName::Input(_) => TargetType::Port,
        }
    }

    pub fn as_input(&self) -> Option<InputEvent> {
        match self {
            EventName::Input(e) => Some(*e),
            EventName::Interface(_) => None,
        }
    }

    /// Property paths this event kind can supply, in declaration order.
    pub fn properties(&self) -> &'static [&'static str] {
        match self {
            EventName::Interface(e) => e.properties(),
            EventName::Input(e) => e.properties(),
        }
    }

    /// Every event available on `target_type` with its property paths.
    pub fn catalogue(target_type: TargetType) -> Vec<(EventName, &'static [&'static str])> {
        match target_type {
            TargetType::Interface => InterfaceEvent::ALL
                .into_iter()
                .map(|e| (EventName::Interface(e), e.properties()))
                .collect(),
            TargetType::Port => InputEvent::ALL
                .into_iter()
                .map(|e| (EventName::Input(e), e.properties()))
                .collect(),
        }
    }
}

impl From<InterfaceEvent> for EventName {
    fn from(event: InterfaceEvent) -> Self {
        EventName::Interface(event)
    }
}

impl From<InputEvent> for EventName {
    fn from(event: InputEvent) -> Self {
        EventName::Input(event)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
