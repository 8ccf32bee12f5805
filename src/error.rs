//! Centralized error type for the midibridge umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] midibridge_io::Error),

    #[error("MIDI event: {0}")]
    Event(#[from] midibridge_midi::Error),

    #[error("No MIDI input with name or id {0:?}")]
    InputNotFound(String),

    #[error("MIDI input index {0} out of range")]
    InputIndexOutOfRange(usize),

    #[error("MIDI input {0:?} is out of sync with the interface (likely unplugged)")]
    InputOutOfSync(String),
}

pub type Result<T> = std::result::Result<T, Error>;
