//! Conversions from MDX/OPM parameters to MIDI parameters

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::events::{MidiValue, PitchBend};

use serde::{Deserialize, Serialize};

/// OPM timer clock constant: `bpm = 60 * TEMPO_CLOCK / tempo_value`.
pub const TEMPO_CLOCK: u32 = 4096;

/// Used in place of an invalid tempo value of 0.
pub const FALLBACK_TEMPO_VALUE: u8 = 200;

pub const DEFAULT_BPM: f64 = 120.0;

pub fn tempo_to_bpm(tempo_value: u8) -> f64 {
    let t = match tempo_value {
        0 => FALLBACK_TEMPO_VALUE,
        t => t,
    };
    f64::from(60 * TEMPO_CLOCK) / f64::from(t)
}

// Detune full-scale (32768) to the MIDI pitch bend half-range (8192)
const DETUNE_TO_PITCH_BEND_SHIFT: u32 = 2;

pub fn detune_to_pitch_bend(detune: i16) -> PitchBend {
    let offset = i32::from(detune) >> DETUNE_TO_PITCH_BEND_SHIFT;

    PitchBend::new_clamped(i32::from(PitchBend::CENTER.as_u16()) + offset)
}

/// Converts an OPM key fraction register value (upper 6 bits, 1/64th semitone steps).
///
/// Assumes the default +/- 2 semitone pitch bend range.
pub fn key_fraction_to_pitch_bend(value: u8) -> PitchBend {
    const PITCH_BEND_PER_SEMITONE: i32 = 4096;
    const KEY_FRACTIONS_PER_SEMITONE: i32 = 64;

    let kf = i32::from(value >> 2);

    PitchBend::new_clamped(
        i32::from(PitchBend::CENTER.as_u16())
            + kf * PITCH_BEND_PER_SEMITONE / KEY_FRACTIONS_PER_SEMITONE,
    )
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub enum Pan {
    Left,
    #[default]
    Center,
    Right,
}

impl Pan {
    pub fn from_mdx(code: u8) -> Self {
        match code {
            0 => Pan::Left,
            1 => Pan::Center,
            2 => Pan::Right,
            // 3 (both outputs) and invalid values
            _ => Pan::Center,
        }
    }

    pub fn midi_value(self) -> MidiValue {
        match self {
            Pan::Left => MidiValue::MIN,
            Pan::Center => MidiValue::new_clamped(64),
            Pan::Right => MidiValue::MAX,
        }
    }
}

/// How voices without an explicit mapping are converted to a MIDI program.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFallback {
    /// `voice % 128`
    #[default]
    Modulo,

    /// The first program of one of the 16 eight-program GM categories.
    ///
    /// Used when approximating a synthesized voice bank.
    Category,
}

const GM_PROGRAMS_PER_CATEGORY: u8 = 8;
const GM_CATEGORIES: u8 = 16;

impl InstrumentFallback {
    pub fn program(self, voice: u8) -> MidiValue {
        match self {
            Self::Modulo => MidiValue::new_clamped(voice % 128),
            Self::Category => {
                MidiValue::new_clamped((voice % GM_CATEGORIES) * GM_PROGRAMS_PER_CATEGORY)
            }
        }
    }
}

// (voice, GM program)
#[rustfmt::skip]
pub const DEFAULT_VOICE_TABLE: &[(u8, u8)] = &[
    (0,   0),   // piano
    (1,   4),   // electric piano
    (2,  33),   // fingered bass
    (3,  62),   // synth brass
    (4,  80),   // square lead
    (5,  88),   // new age pad
];

/// Voice to MIDI program lookup.
///
/// Every voice is resolved once when the map is built, lookups are idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentMap {
    programs: [MidiValue; 256],
}

impl InstrumentMap {
    pub fn new(table: &[(u8, MidiValue)], fallback: InstrumentFallback) -> Self {
        let mut programs: [MidiValue; 256] =
            std::array::from_fn(|v| fallback.program(v as u8));

        for &(voice, program) in table {
            programs[usize::from(voice)] = program;
        }

        Self { programs }
    }

    pub fn program(&self, voice: u8) -> MidiValue {
        self.programs[usize::from(voice)]
    }
}

impl Default for InstrumentMap {
    fn default() -> Self {
        let table: Vec<(u8, MidiValue)> = DEFAULT_VOICE_TABLE
            .iter()
            .map(|&(v, p)| (v, MidiValue::new_clamped(p)))
            .collect();

        Self::new(&table, InstrumentFallback::default())
    }
}
