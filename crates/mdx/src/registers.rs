//! OPM register write translation
//!
//! Only a handful of YM2151 registers have a MIDI counterpart.  Writes to any
//! other register are logged and dropped.

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::events::{controllers, Event, MidiValue};
use crate::interpreter::TrackState;
use crate::mappers::key_fraction_to_pitch_bend;
use crate::time::TickCounter;

use log::debug;

use std::ops::RangeInclusive;

pub struct RegisterHandler {
    pub registers: RangeInclusive<u8>,
    pub name: &'static str,
    translate: fn(value: u8, s: &mut TrackState, time: TickCounter) -> Option<Event>,
}

pub static REGISTER_HANDLERS: [RegisterHandler; 5] = [
    RegisterHandler {
        registers: 0x20..=0x27,
        name: "RL/FB/CONNECT",
        translate: rl_feedback_connection,
    },
    RegisterHandler {
        registers: 0x30..=0x37,
        name: "KF",
        translate: key_fraction,
    },
    RegisterHandler {
        registers: 0x60..=0x7f,
        name: "TL",
        translate: total_level,
    },
    RegisterHandler {
        registers: 0x80..=0x9f,
        name: "KS/AR",
        translate: attack_rate,
    },
    RegisterHandler {
        registers: 0xa0..=0xbf,
        name: "AMS-EN/D1R",
        translate: first_decay_rate,
    },
];

pub fn find_register_handler(register: u8) -> Option<&'static RegisterHandler> {
    REGISTER_HANDLERS
        .iter()
        .find(|h| h.registers.contains(&register))
}

pub fn translate_register_write(
    register: u8,
    value: u8,
    s: &mut TrackState,
    time: TickCounter,
) -> Option<Event> {
    match find_register_handler(register) {
        Some(h) => {
            let event = (h.translate)(value, s, time);
            debug!(
                "OPM register ${:02x} ({}) = ${:02x} -> {:?}",
                register, h.name, value, event
            );
            event
        }
        None => {
            debug!(
                "OPM register ${:02x} = ${:02x} has no MIDI equivalent",
                register, value
            );
            None
        }
    }
}

fn controller(time: TickCounter, controller: u8, value: u8) -> Event {
    Event::ControllerChange {
        time,
        controller,
        value: MidiValue::new_clamped(value),
    }
}

// OPM rates are 0 - 31, 31 is the fastest.
fn rate_to_time(rate: u8) -> u8 {
    let rate = u16::from(rate & 0x1f);
    ((31 - rate) * 127 / 31) as u8
}

fn rl_feedback_connection(value: u8, _: &mut TrackState, time: TickCounter) -> Option<Event> {
    let pan = match (value >> 6) & 0x03 {
        0 => return None,
        0b01 => 96,
        0b10 => 32,
        _ => 64,
    };
    Some(controller(time, controllers::PAN, pan))
}

fn key_fraction(value: u8, _: &mut TrackState, time: TickCounter) -> Option<Event> {
    Some(Event::PitchBend {
        time,
        value: key_fraction_to_pitch_bend(value),
    })
}

fn total_level(value: u8, s: &mut TrackState, time: TickCounter) -> Option<Event> {
    // TL is an attenuation
    s.expression = MidiValue::new_clamped(127 - (value & 0x7f));

    Some(controller(time, controllers::EXPRESSION, s.expression.as_u8()))
}

fn attack_rate(value: u8, _: &mut TrackState, time: TickCounter) -> Option<Event> {
    Some(controller(time, controllers::ATTACK_TIME, rate_to_time(value)))
}

fn first_decay_rate(value: u8, _: &mut TrackState, time: TickCounter) -> Option<Event> {
    Some(controller(time, controllers::DECAY_TIME, rate_to_time(value)))
}
