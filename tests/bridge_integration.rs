//! Integration tests for the midibridge umbrella crate
//!
//! End-to-end flows through [`MidiBridge`]: the enable handshake, input
//! views, local listeners, and remote commands arriving on the interface
//! model's message channel.
//!
//! Run with:
//! ```bash
//! cargo test -p midibridge --test bridge_integration
//! ```

mod helpers;

use helpers::{rig, rig_with, two_ports, wait_until, KEYS, PADS};
use midibridge::io::Error as CoreError;
use midibridge::prelude::*;
use serde_json::json;

fn add_listener(model_id: &str, target_id: &str, event_id: &str) -> serde_json::Value {
    json!({
        "action": "add_listener",
        "args": {
            "target_type": "input",
            "target_id": target_id,
            "event_model_id": model_id,
            "event_name": "controlchange",
            "event_props": ["value", "controller_number"],
            "event_id": event_id,
        }
    })
}

// ---------------------------------------------------------------------------
// 1. Handshake
// ---------------------------------------------------------------------------

#[test]
fn test_enable_publishes_inputs_in_enumeration_order() {
    let rig = rig();
    rig.bridge.enable().unwrap();

    assert!(rig.bridge.is_enabled());
    assert_eq!(rig.interface_model.get("enabled"), Some(json!(true)));
    assert_eq!(
        rig.interface_model.get("_inputs"),
        Some(serde_json::to_value(two_ports()).unwrap())
    );

    let inputs = rig.bridge.inputs().unwrap();
    assert_eq!(inputs.ids(), vec![KEYS, PADS]);
}

#[test]
fn test_denied_access_leaves_interface_disabled() {
    let rig = rig();
    rig.backend.deny_access("blocked by browser");

    let err = rig.bridge.enable().unwrap_err();
    assert!(matches!(
        err,
        Error::Core(CoreError::PermissionDenied(reason)) if reason == "blocked by browser"
    ));
    assert!(!rig.bridge.is_enabled());
    assert_eq!(rig.interface_model.get("enabled"), Some(json!(false)));
    assert!(rig.bridge.inputs().is_err());

    // callers retry explicitly
    rig.backend.grant_access();
    rig.bridge.enable().unwrap();
    assert_eq!(rig.interface_model.get("enabled"), Some(json!(true)));
}

#[test]
fn test_repeated_enable_handshakes_once() {
    let rig = rig();
    for _ in 0..5 {
        rig.bridge.enable().unwrap();
    }
    assert_eq!(rig.backend.access_requests(), 1);
    assert_eq!(rig.bridge.bus().total_listeners(), 1);
}

#[test]
fn test_initialize_closes_listeners_and_requires_enable() {
    let rig = rig();
    let err = rig
        .bridge
        .input(KEYS)
        .and_then(|keys| keys.track("noteon", &[]))
        .unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::NotEnabled)));

    rig.bridge.enable().unwrap();
    let notes = rig.bridge.input(KEYS).unwrap().track("noteon", &[]).unwrap();
    rig.bridge.initialize();

    assert!(!rig.bridge.is_enabled());
    assert!(notes.model().is_destroyed());
    assert!(rig.bridge.listeners(&ListenerFilter::any()).is_empty());
    assert_eq!(rig.interface_model.get("_inputs"), Some(json!([])));

    rig.bridge.enable().unwrap();
    assert_eq!(rig.bridge.inputs().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// 2. Local listeners
// ---------------------------------------------------------------------------

#[test]
fn test_port_listener_receives_notes() {
    let rig = rig();
    rig.bridge.enable().unwrap();
    let notes = rig
        .bridge
        .input("Keys")
        .unwrap()
        .track("noteon", &["note_identifier", "note_number", "value"])
        .unwrap();

    rig.backend.send_bytes(KEYS, &[0x90, 64, 127]);
    rig.backend.send_bytes(PADS, &[0x90, 36, 127]);
    rig.bridge.pump();

    assert_eq!(notes.count(), 1);
    assert_eq!(notes.get("note_identifier"), Some(json!("E4")));
    assert_eq!(notes.get("note_number"), Some(json!(64)));
    assert_eq!(notes.get("value"), Some(json!(1.0)));
    assert_eq!(notes.model().save_count(), 1);
}

#[test]
fn test_interface_listener_sees_hotplug() {
    let rig = rig();
    rig.bridge.enable().unwrap();
    let plugs = rig
        .bridge
        .track_interface("connected", &["port_id", "port_name"])
        .unwrap();
    let changes = rig.bridge.track_interface("portschanged", &[]).unwrap();

    rig.backend
        .connect_port(PortSnapshot::connected("drums-1", "Drums", "Gamma"));
    rig.bridge.pump();

    assert_eq!(plugs.count(), 1);
    assert_eq!(plugs.get("port_name"), Some(json!("Drums")));
    assert_eq!(changes.count(), 1);
    assert_eq!(rig.bridge.inputs().unwrap().names(), vec!["Keys", "Pads", "Drums"]);

    rig.backend.disconnect_port(KEYS);
    rig.bridge.pump();
    assert_eq!(changes.count(), 2);
    assert_eq!(rig.bridge.inputs().unwrap().ids(), vec![PADS, "drums-1"]);
}

#[test]
fn test_unknown_property_rejected_at_subscription() {
    let rig = rig();
    rig.bridge.enable().unwrap();
    let err = rig
        .bridge
        .input(KEYS)
        .unwrap()
        .track("noteon", &["controller_number"])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(CoreError::UnsupportedProperty { property, .. }) if property == "controller_number"
    ));
    assert!(rig.bridge.listeners(&ListenerFilter::any()).is_empty());
}

#[test]
fn test_disabled_listener_resumes_without_duplicates() {
    let rig = rig();
    rig.bridge.enable().unwrap();
    let notes = rig.bridge.input(KEYS).unwrap().track("noteoff", &[]).unwrap();

    for _ in 0..3 {
        notes.set_enabled(false);
    }
    rig.backend.send_bytes(KEYS, &[0x80, 60, 0]);
    rig.bridge.pump();
    assert_eq!(notes.count(), 0);

    for _ in 0..3 {
        notes.set_enabled(true);
    }
    rig.backend.send_bytes(KEYS, &[0x80, 60, 0]);
    rig.bridge.pump();
    assert_eq!(notes.count(), 1);
    assert_eq!(notes.get("count"), Some(json!(1)));
}

#[test]
fn test_long_run_keeps_only_latest_state() {
    let rig = rig();
    rig.bridge.enable().unwrap();
    let notes = rig.bridge.input(KEYS).unwrap().track("noteon", &["value"]).unwrap();

    for _ in 0..10_000 {
        rig.backend.send_bytes(KEYS, &[0x90, 60, 100]);
    }
    rig.bridge.pump();

    assert_eq!(notes.count(), 10_000);
    assert_eq!(notes.model().save_count(), 10_000);
    let commit = notes.model().last_commit().unwrap();
    assert_eq!(commit["count"], json!(10_000));
    assert_eq!(commit.len(), 3);
}

// ---------------------------------------------------------------------------
// 3. Remote commands
// ---------------------------------------------------------------------------

#[test]
fn test_add_then_remove_listener() {
    let rig = rig();
    let knob = LocalModel::shared("knob-model");
    rig.bridge
        .register_model(Arc::clone(&knob) as Arc<dyn StateModel>);

    rig.interface_model
        .receive_message(&add_listener("knob-model", PADS, "x"))
        .unwrap();
    assert!(rig.bridge.is_enabled());
    assert!(rig.bridge.interface().registry().contains("x"));

    rig.backend.send_bytes(PADS, &[0xB0, 7, 64]);
    rig.bridge.pump();
    assert_eq!(knob.get("controller_number"), Some(json!(7)));
    assert_eq!(knob.get("count"), Some(json!(1)));
    let saves = knob.save_count();

    let remove = json!({ "action": "remove_listener", "args": { "event_id": "x" } });
    rig.interface_model.receive_message(&remove).unwrap();
    rig.interface_model.receive_message(&remove).unwrap();
    assert!(rig.bridge.interface().registry().is_empty());

    rig.backend.send_bytes(PADS, &[0xB0, 7, 0]);
    rig.bridge.pump();
    assert_eq!(knob.save_count(), saves);
    assert_eq!(knob.get("count"), Some(json!(1)));
}

#[test]
fn test_add_listener_unknown_port_registers_nothing() {
    let rig = rig();
    rig.bridge
        .register_model(LocalModel::shared("knob-model") as Arc<dyn StateModel>);

    let err = rig
        .bridge
        .handle_message(&add_listener("knob-model", "no-such-port", "x"))
        .unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::UnknownTarget(_))));
    assert!(rig.bridge.interface().registry().is_empty());
}

#[test]
fn test_add_listener_unknown_model_registers_nothing() {
    let rig = rig();
    let err = rig
        .bridge
        .handle_message(&add_listener("ghost", KEYS, "x"))
        .unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::UnknownTarget(_))));
    assert!(rig.bridge.interface().registry().is_empty());
}

#[test]
fn test_unknown_command_is_reported() {
    let rig = rig();
    let err = rig
        .interface_model
        .receive_message(&json!({ "command": "explode" }))
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownCommand(action) if action == "explode"));
}

#[test]
fn test_overwritten_event_id_delivers_once() {
    let rig = rig();
    let knob = LocalModel::shared("knob-model");
    rig.bridge
        .register_model(Arc::clone(&knob) as Arc<dyn StateModel>);

    rig.bridge
        .handle_message(&add_listener("knob-model", PADS, "x"))
        .unwrap();
    rig.bridge
        .handle_message(&add_listener("knob-model", PADS, "x"))
        .unwrap();
    assert_eq!(rig.bridge.interface().registry().len(), 1);

    rig.backend.send_bytes(PADS, &[0xB0, 1, 127]);
    rig.bridge.pump();
    assert_eq!(knob.get("count"), Some(json!(1)));
}

// ---------------------------------------------------------------------------
// 4. Dispatcher thread
// ---------------------------------------------------------------------------

#[test]
fn test_dispatcher_delivers_without_pumping() {
    let rig = rig_with(MidiBridge::builder().dispatch_thread());
    assert!(rig.bridge.has_dispatcher());
    rig.bridge.enable().unwrap();

    let bends = rig
        .bridge
        .input(KEYS)
        .unwrap()
        .track("pitchbend", &["value"])
        .unwrap();
    rig.backend.send_bytes(KEYS, &[0xE0, 0x00, 0x40]);

    assert!(wait_until(Duration::from_secs(2), || bends.count() == 1));
    assert_eq!(bends.get("value"), Some(json!(0.0)));
}
