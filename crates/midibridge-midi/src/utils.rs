//! Value scaling helpers.

/// 7-bit velocity or controller value scaled to 0.0..=1.0.
#[inline]
pub fn velocity_to_value(raw: u8) -> f64 {
    (raw & 0x7F) as f64 / 127.0
}

/// 14-bit pitch bend (centre 8192) scaled to -1.0..=1.0.
#[inline]
pub fn bend_to_value(raw: u16) -> f64 {
    let centred = raw.min(16383) as f64 - 8192.0;
    if centred >= 0.0 {
        centred / 8191.0
    } else {
        centred / 8192.0
    }
}

/// Conventional name of a controller number, `controllerN` when unnamed.
pub fn controller_name(number: u8) -> String {
    let name = match number {
        0 => "bankselectcoarse",
        1 => "modulationwheelcoarse",
        2 => "breathcontrollercoarse",
        4 => "footcontrollercoarse",
        5 => "portamentotimecoarse",
        6 => "dataentrycoarse",
        7 => "volumecoarse",
        8 => "balancecoarse",
        10 => "pancoarse",
        11 => "expressioncoarse",
        32 => "bankselectfine",
        33 => "modulationwheelfine",
        64 => "damperpedal",
        65 => "portamento",
        66 => "sostenuto",
        67 => "softpedal",
        68 => "legatopedal",
        71 => "resonance",
        72 => "releasetime",
        73 => "attacktime",
        74 => "brightness",
        120 => "allsoundoff",
        121 => "resetallcontrollers",
        122 => "localcontrol",
        123 => "allnotesoff",
        124 => "omnimodeoff",
        125 => "omnimodeon",
        126 => "monomodeon",
        127 => "polymodeon",
        _ => return format!("controller{number}"),
    };
    name.to_string()
}
