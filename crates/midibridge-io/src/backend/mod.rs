//! Hardware backend seam.
//!
//! A backend owns the platform MIDI API. After a successful
//! [`MidiBackend::request_access`] it pushes every input event and every
//! topology change into the [`EventSink`] it was handed. A topology change is
//! an interface `connected`/`disconnected` event carrying the port, followed by
//! an interface `portschanged` event.

use midibridge_midi::PortSnapshot;

use crate::bus::EventSink;
use crate::error::Result;

#[cfg(feature = "hardware")]
mod hardware;
#[cfg(feature = "hardware")]
pub use hardware::{assign_port_ids, MidirBackend};

mod virtual_backend;
pub use virtual_backend::VirtualBackend;

pub trait MidiBackend: Send + Sync {
    /// Permission / activation handshake.
    ///
    /// Blocks until the platform answers. Calling it again after a success
    /// keeps the existing session and returns `Ok`.
    fn request_access(&self, sink: EventSink) -> Result<()>;

    /// Current inputs in device-enumeration order.
    fn inputs(&self) -> Vec<PortSnapshot>;

    fn input_by_id(&self, id: &str) -> Option<PortSnapshot> {
        self.inputs().into_iter().find(|port| port.id == id)
    }
}
