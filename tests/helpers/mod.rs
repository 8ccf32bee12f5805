//! Test helpers and fixtures for midibridge integration tests
//!
//! Every fixture runs on the virtual backend, so no MIDI hardware or
//! permissions are needed in CI.

use midibridge::prelude::*;
use std::time::Instant;

/// Enumeration order of the default rig: keys first, pads second.
pub const KEYS: &str = "keys-1";
pub const PADS: &str = "pads-1";

pub struct Rig {
    pub backend: Arc<VirtualBackend>,
    pub interface_model: Arc<LocalModel>,
    pub bridge: MidiBridge,
}

pub fn two_ports() -> Vec<PortSnapshot> {
    vec![
        PortSnapshot::connected(KEYS, "Keys", "Acme"),
        PortSnapshot::connected(PADS, "Pads", "Beta"),
    ]
}

/// Bridge over a virtual backend with [`two_ports`], not yet enabled.
/// Events are delivered by pumping.
pub fn rig() -> Rig {
    rig_with(MidiBridge::builder())
}

pub fn rig_with(builder: MidiBridgeBuilder) -> Rig {
    let backend = Arc::new(VirtualBackend::with_ports(two_ports()));
    let interface_model = LocalModel::shared("interface");
    let bridge = builder
        .backend(Arc::clone(&backend) as Arc<dyn MidiBackend>)
        .interface_model(Arc::clone(&interface_model) as Arc<dyn StateModel>)
        .build()
        .expect("Failed to create test bridge");
    Rig {
        backend,
        interface_model,
        bridge,
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
