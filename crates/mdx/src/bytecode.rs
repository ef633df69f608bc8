//! MDX track bytecode

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::cursor::ByteCursor;
use crate::errors::DecodeError;
use crate::events::MidiValue;
use crate::time::TickCounter;

use serde::Serialize;

pub const FIRST_NOTE_OPCODE: u8 = 0x80;
pub const LAST_NOTE_OPCODE: u8 = 0xdf;

pub mod opcodes {
    // opcodes 0x80 - 0xdf are note opcodes

    pub const REST: u8 = 0x00;

    pub const LOOP_START: u8 = 0xe1;
    pub const LOOP_END: u8 = 0xe2;
    pub const LFO: u8 = 0xe3;

    pub const INSTRUMENT: u8 = 0xe6;
    pub const TEMPO: u8 = 0xe7;
    pub const PORTAMENTO: u8 = 0xe8;
    pub const GATE_TIME: u8 = 0xe9;
    pub const DETUNE: u8 = 0xea;
    pub const VOLUME: u8 = 0xeb;
    pub const PAN: u8 = 0xec;
    pub const REGISTER_WRITE: u8 = 0xed;
    pub const KEY_ON_DELAY: u8 = 0xef;
}

pub mod lfo_flags {
    pub const VIBRATO: u8 = 0x01;
    pub const TREMOLO: u8 = 0x02;
    pub const HARDWARE_LFO: u8 = 0x04;

    pub const VIBRATO_PARAMETERS: usize = 2;
    pub const TREMOLO_PARAMETERS: usize = 2;
    pub const HARDWARE_LFO_PARAMETERS: usize = 3;
}

/// Unrecognised opcodes in this range have a two byte parameter.
pub const WORD_SKIP_OPCODES: std::ops::RangeInclusive<u8> = 0xe4..=0xe5;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Note,
    Rest,
    Tempo,
    Volume,
    Instrument,
    Pan,
    Detune,
    Portamento,
    GateTime,
    LoopStart,
    LoopEnd,
    Lfo,
    RegisterWrite,
    KeyOnDelay,
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandLength {
    Fixed(u8),
    // One flags byte followed by the parameters of every enabled LFO
    LfoFlags,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperandSpec {
    pub kind: CommandKind,
    pub length: OperandLength,
}

const fn fixed(kind: CommandKind, length: u8) -> OperandSpec {
    OperandSpec {
        kind,
        length: OperandLength::Fixed(length),
    }
}

pub const fn operand_spec(opcode: u8) -> OperandSpec {
    use CommandKind as K;

    match opcode {
        opcodes::REST => fixed(K::Rest, 1),
        FIRST_NOTE_OPCODE..=LAST_NOTE_OPCODE => fixed(K::Note, 2),

        opcodes::LOOP_START => fixed(K::LoopStart, 0),
        opcodes::LOOP_END => fixed(K::LoopEnd, 1),
        opcodes::LFO => OperandSpec {
            kind: K::Lfo,
            length: OperandLength::LfoFlags,
        },

        opcodes::INSTRUMENT => fixed(K::Instrument, 1),
        opcodes::TEMPO => fixed(K::Tempo, 1),
        opcodes::PORTAMENTO => fixed(K::Portamento, 2),
        opcodes::GATE_TIME => fixed(K::GateTime, 1),
        opcodes::DETUNE => fixed(K::Detune, 2),
        opcodes::VOLUME => fixed(K::Volume, 1),
        opcodes::PAN => fixed(K::Pan, 1),
        opcodes::REGISTER_WRITE => fixed(K::RegisterWrite, 2),
        opcodes::KEY_ON_DELAY => fixed(K::KeyOnDelay, 1),

        0xe4 | 0xe5 => fixed(K::Unknown, 2),
        _ => fixed(K::Unknown, 1),
    }
}

/// Number of LFO parameter bytes that follow the flags byte.
pub fn lfo_parameter_length(flags: u8) -> usize {
    let mut n = 0;
    if flags & lfo_flags::VIBRATO != 0 {
        n += lfo_flags::VIBRATO_PARAMETERS;
    }
    if flags & lfo_flags::TREMOLO != 0 {
        n += lfo_flags::TREMOLO_PARAMETERS;
    }
    if flags & lfo_flags::HARDWARE_LFO != 0 {
        n += lfo_flags::HARDWARE_LFO_PARAMETERS;
    }
    n
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LfoSettings {
    pub flags: u8,
    pub vibrato: Option<[u8; lfo_flags::VIBRATO_PARAMETERS]>,
    pub tremolo: Option<[u8; lfo_flags::TREMOLO_PARAMETERS]>,
    pub hardware_lfo: Option<[u8; lfo_flags::HARDWARE_LFO_PARAMETERS]>,
}

impl LfoSettings {
    // `parameters` MUST be `lfo_parameter_length(flags)` bytes long
    fn new(flags: u8, parameters: &[u8]) -> Self {
        let mut p = parameters.iter().copied();
        let mut next = || p.next().unwrap_or(0);

        Self {
            flags,
            vibrato: (flags & lfo_flags::VIBRATO != 0).then(|| [next(), next()]),
            tremolo: (flags & lfo_flags::TREMOLO != 0).then(|| [next(), next()]),
            hardware_lfo: (flags & lfo_flags::HARDWARE_LFO != 0).then(|| [next(), next(), next()]),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Note {
        note: MidiValue,
        length: TickCounter,
        velocity: MidiValue,
    },
    Rest {
        length: TickCounter,
    },
    Tempo(u8),
    Volume(u8),
    Instrument(u8),
    Pan(u8),
    Detune(i16),
    Portamento(i16),
    GateTime(u8),
    LoopStart,
    LoopEnd {
        count: u8,
    },
    Lfo(LfoSettings),
    RegisterWrite {
        register: u8,
        value: u8,
    },
    KeyOnDelay(u8),
    Unknown {
        opcode: u8,
        skipped: u8,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodedCommand {
    pub position: usize,
    pub opcode: u8,
    // Number of bytes read, including the opcode
    pub size: usize,
    pub command: Command,
}

/// Decodes the command under the cursor and advances past it.
///
/// The cursor is not moved if the command cannot be decoded.
pub fn decode_command(cursor: &mut ByteCursor) -> Result<DecodedCommand, DecodeError> {
    let position = cursor.position();

    let (&opcode, operands) = match cursor.remaining_bytes().split_first() {
        Some(s) => s,
        None => return Err(DecodeError::EndOfData { position }),
    };

    let layout = operand_spec(opcode);

    let required = match layout.length {
        OperandLength::Fixed(n) => usize::from(n),
        OperandLength::LfoFlags => match operands.first() {
            Some(&flags) => 1 + lfo_parameter_length(flags),
            None => 1,
        },
    };

    if operands.len() < required {
        return Err(DecodeError::Truncated {
            opcode,
            position,
            required,
            available: operands.len(),
        });
    }
    let o = &operands[..required];

    let i16_operand = || i16::from_le_bytes([o[0], o[1]]);

    let command = match layout.kind {
        CommandKind::Note => Command::Note {
            note: MidiValue::new_clamped(opcode & 0x7f),
            length: TickCounter::new(o[0].into()),
            velocity: MidiValue::new_clamped(o[1]),
        },
        CommandKind::Rest => Command::Rest {
            length: TickCounter::new(o[0].into()),
        },
        CommandKind::Tempo => Command::Tempo(o[0]),
        CommandKind::Volume => Command::Volume(o[0]),
        CommandKind::Instrument => Command::Instrument(o[0]),
        CommandKind::Pan => Command::Pan(o[0]),
        CommandKind::Detune => Command::Detune(i16_operand()),
        CommandKind::Portamento => Command::Portamento(i16_operand()),
        CommandKind::GateTime => Command::GateTime(o[0]),
        CommandKind::LoopStart => Command::LoopStart,
        CommandKind::LoopEnd => Command::LoopEnd { count: o[0] },
        CommandKind::Lfo => Command::Lfo(LfoSettings::new(o[0], &o[1..])),
        CommandKind::RegisterWrite => Command::RegisterWrite {
            register: o[0],
            value: o[1],
        },
        CommandKind::KeyOnDelay => Command::KeyOnDelay(o[0]),
        CommandKind::Unknown => Command::Unknown {
            opcode,
            skipped: o.len() as u8,
        },
    };

    let size = 1 + required;
    cursor.advance(size);

    Ok(DecodedCommand {
        position,
        opcode,
        size,
        command,
    })
}
