//! Note descriptions carried by note-scoped events.
//!
//! Names use scientific pitch notation with sharps. Middle C (MIDI 60) is `C4`.

use serde::Serialize;

use crate::utils::velocity_to_value;

const NAMES: [(&str, Option<&str>); 12] = [
    ("C", None),
    ("C", Some("#")),
    ("D", None),
    ("D", Some("#")),
    ("E", None),
    ("F", None),
    ("F", Some("#")),
    ("G", None),
    ("G", Some("#")),
    ("A", None),
    ("A", Some("#")),
    ("B", None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub number: u8,
    pub identifier: String,
    pub name: String,
    pub accidental: Option<String>,
    pub octave: i8,
    pub attack: f64,
    pub release: f64,
    pub raw_attack: u8,
    pub raw_release: u8,
}

impl Note {
    pub fn new(number: u8) -> Self {
        let number = number & 0x7F;
        let (name, accidental) = NAMES[(number % 12) as usize];
        let octave = (number / 12) as i8 - 1;
        Self {
            number,
            identifier: format!("{}{}{}", name, accidental.unwrap_or(""), octave),
            name: name.to_string(),
            accidental: accidental.map(str::to_string),
            octave,
            attack: 0.0,
            release: 0.0,
            raw_attack: 0,
            raw_release: 0,
        }
    }

    pub fn with_attack(mut self, raw: u8) -> Self {
        self.raw_attack = raw & 0x7F;
        self.attack = velocity_to_value(raw);
        self
    }

    pub fn with_release(mut self, raw: u8) -> Self {
        self.raw_release = raw & 0x7F;
        self.release = velocity_to_value(raw);
        self
    }
}
