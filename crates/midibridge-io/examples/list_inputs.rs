use midibridge_io::{InterfaceManager, LocalModel, MidirBackend, ModelDirectory};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt::init();

    let backend = Arc::new(MidirBackend::new("list-inputs", Duration::from_millis(500)));
    let manager = Arc::new(InterfaceManager::new(
        backend,
        LocalModel::shared("interface"),
        Arc::new(ModelDirectory::new()),
    ));

    if let Err(e) = manager.enable() {
        eprintln!("MIDI unavailable: {e}");
        return;
    }

    println!("=== MIDI Inputs ===");
    let inputs = manager.inputs();
    if inputs.is_empty() {
        println!("  (none found)");
    }
    for (i, port) in inputs.iter().enumerate() {
        println!("  [{}] {} ({}, {})", i, port.id, port.connection, port.state);
    }
}
