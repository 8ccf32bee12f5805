//! Error types for the synchronization core.

use midibridge_midi::TargetType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI access denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Event {event:?} is not supported on target type {target_type}")]
    UnsupportedEvent {
        target_type: TargetType,
        event: String,
    },

    #[error("Event {event:?} has no property {property:?}")]
    UnsupportedProperty { event: String, property: String },

    #[error("MIDI is not enabled")]
    NotEnabled,

    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] serde_json::Error),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),
}

impl From<midibridge_midi::Error> for Error {
    fn from(e: midibridge_midi::Error) -> Self {
        match e {
            midibridge_midi::Error::UnsupportedEvent { target_type, event } => {
                Error::UnsupportedEvent { target_type, event }
            }
            midibridge_midi::Error::UnsupportedProperty { event, property } => {
                Error::UnsupportedProperty { event, property }
            }
            midibridge_midi::Error::MissingTargetId(target_type) => {
                Error::UnknownTarget(format!("{target_type} target without an id"))
            }
        }
    }
}

#[cfg(feature = "hardware")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::PermissionDenied(e.to_string())
    }
}

#[cfg(feature = "hardware")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
