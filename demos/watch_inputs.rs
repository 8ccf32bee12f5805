//! Prints note-ons from every input and plug / unplug events for 30 seconds.

use midibridge::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let bridge = MidiBridge::builder()
        .client_name("watch-inputs")
        .hardware()
        .dispatch_thread()
        .build()?;
    bridge.enable()?;

    let inputs = bridge.inputs()?;
    println!("{inputs}");

    let plugs = bridge.track_interface("connected", &["port_name"])?;
    let unplugs = bridge.track_interface("disconnected", &["port_name"])?;
    let notes: Vec<(String, Listener)> = inputs
        .to_vec()
        .into_iter()
        .map(|input| {
            let listener = input.track("noteon", &["note_identifier", "value"])?;
            Ok((input.name(), listener))
        })
        .collect::<Result<_>>()?;

    let mut seen: Vec<u64> = vec![0; notes.len()];
    let (mut plugged, mut unplugged) = (0, 0);
    for _ in 0..300 {
        std::thread::sleep(Duration::from_millis(100));

        for ((name, listener), seen) in notes.iter().zip(seen.iter_mut()) {
            if listener.count() != *seen {
                *seen = listener.count();
                println!(
                    "{name}: {} velocity {}",
                    listener.get("note_identifier").unwrap_or_default(),
                    listener.get("value").unwrap_or_default()
                );
            }
        }
        if plugs.count() != plugged {
            plugged = plugs.count();
            println!("+ {}", plugs.get("port_name").unwrap_or_default());
        }
        if unplugs.count() != unplugged {
            unplugged = unplugs.count();
            println!("- {}", unplugs.get("port_name").unwrap_or_default());
        }
    }

    bridge.close_all();
    Ok(())
}
