//! Timestamped musical events produced by the track interpreter

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::errors::ValueError;
use crate::newtype_macros::u8_newtype;
use crate::time::{GatedLength, TickCounter};

use serde::Serialize;

u8_newtype!(MidiValue, MidiValueOutOfRange, 0, 127);

pub mod controllers {
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const ATTACK_TIME: u8 = 73;
    pub const DECAY_TIME: u8 = 75;
}

/// 14 bit pitch bend value, 8192 is no bend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PitchBend(u16);

impl PitchBend {
    pub const MIN: PitchBend = PitchBend(0);
    pub const CENTER: PitchBend = PitchBend(8192);
    pub const MAX: PitchBend = PitchBend(16383);

    pub fn new_clamped(value: i32) -> Self {
        Self(value.clamp(Self::MIN.0.into(), Self::MAX.0.into()) as u16)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NoteOn {
        time: TickCounter,
        note: MidiValue,
        duration: GatedLength,
        velocity: MidiValue,
    },
    ControllerChange {
        time: TickCounter,
        controller: u8,
        value: MidiValue,
    },
    ProgramChange {
        time: TickCounter,
        program: MidiValue,
    },
    TempoChange {
        time: TickCounter,
        bpm: f64,
    },
    PitchBend {
        time: TickCounter,
        value: PitchBend,
    },
}

impl Event {
    pub fn time(&self) -> TickCounter {
        match self {
            Event::NoteOn { time, .. }
            | Event::ControllerChange { time, .. }
            | Event::ProgramChange { time, .. }
            | Event::TempoChange { time, .. }
            | Event::PitchBend { time, .. } => *time,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, Event::NoteOn { .. })
    }
}
