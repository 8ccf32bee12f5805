//! Raw MIDI bytes -> input event payloads.

use midly::live::LiveEvent;
use midly::MidiMessage;
use serde_json::{json, Value};
use tracing::debug;

use crate::utils::{bend_to_value, controller_name, velocity_to_value};
use crate::{EventName, EventPayload, InputEvent, Note};

/// Decodes one complete MIDI message received at `timestamp` (ms).
///
/// Every message yields a `midimessage` event. Channel voice messages are
/// followed by their specific event (`noteon`, `controlchange`, ...). A note-on
/// with velocity 0 is reported as `noteoff`. Bytes that do not parse yield
/// nothing.
pub fn decode_message(timestamp: f64, bytes: &[u8]) -> Vec<(EventName, EventPayload)> {
    let event = match LiveEvent::parse(bytes) {
        Ok(event) => event,
        Err(e) => {
            debug!("Failed to parse MIDI message {:02X?}: {}", bytes, e);
            return Vec::new();
        }
    };

    let mut decoded = vec![(
        EventName::Input(InputEvent::MidiMessage),
        raw_payload(timestamp, bytes),
    )];

    if let LiveEvent::Midi { channel, message } = event {
        let base = EventPayload::new(timestamp).with("channel", channel.as_int() + 1);
        let (kind, payload) = match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                let note = Note::new(key.as_int()).with_attack(vel.as_int());
                (InputEvent::NoteOn, note_payload(base, &note, vel.as_int()))
            }
            MidiMessage::NoteOn { key, vel } | MidiMessage::NoteOff { key, vel } => {
                let note = Note::new(key.as_int()).with_release(vel.as_int());
                (InputEvent::NoteOff, note_payload(base, &note, vel.as_int()))
            }
            MidiMessage::Aftertouch { key, vel } => {
                let note = Note::new(key.as_int());
                (
                    InputEvent::KeyAftertouch,
                    note_payload(base, &note, vel.as_int()),
                )
            }
            MidiMessage::Controller { controller, value } => {
                let number = controller.as_int();
                let payload = base
                    .with(
                        "controller",
                        json!({ "number": number, "name": controller_name(number) }),
                    )
                    .with("value", velocity_to_value(value.as_int()))
                    .with("rawValue", value.as_int());
                (InputEvent::ControlChange, payload)
            }
            MidiMessage::ChannelAftertouch { vel } => {
                let payload = base
                    .with("value", velocity_to_value(vel.as_int()))
                    .with("rawValue", vel.as_int());
                (InputEvent::ChannelAftertouch, payload)
            }
            MidiMessage::ProgramChange { program } => {
                let payload = base
                    .with("value", program.as_int())
                    .with("rawValue", program.as_int());
                (InputEvent::ProgramChange, payload)
            }
            MidiMessage::PitchBend { bend } => {
                let raw = bend.0.as_int();
                let payload = base.with("value", bend_to_value(raw)).with("rawValue", raw);
                (InputEvent::PitchBend, payload)
            }
        };
        decoded.push((EventName::Input(kind), payload));
    }

    decoded
}

fn note_payload(base: EventPayload, note: &Note, raw: u8) -> EventPayload {
    base.with_object("note", note)
        .with("value", velocity_to_value(raw))
        .with("rawValue", raw)
}

fn raw_payload(timestamp: f64, bytes: &[u8]) -> EventPayload {
    let data: Vec<Value> = bytes.iter().map(|b| Value::from(*b)).collect();
    let data_bytes: Vec<Value> = bytes.iter().skip(1).map(|b| Value::from(*b)).collect();
    EventPayload::new(timestamp)
        .with("data", data)
        .with("statusByte", bytes.first().copied().unwrap_or(0))
        .with("dataBytes", data_bytes)
}
