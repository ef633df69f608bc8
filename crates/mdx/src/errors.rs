//! A single location for all of the errors in the converter

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::io;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("gate ratio out of range: {0}")]
    GateRatioOutOfRange(u8),
    #[error("MIDI value out of range: {0}")]
    MidiValueOutOfRange(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum DecodeError {
    #[error("no command at {position:#06x}, end of data")]
    EndOfData { position: usize },

    #[error(
        "command 0x{opcode:02x} at {position:#06x} needs {required} operand bytes, only {available} remain"
    )]
    Truncated {
        opcode: u8,
        position: usize,
        required: usize,
        available: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum TrackError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("too many nested loops (max {max_depth})")]
    LoopStackOverflow { max_depth: usize },

    #[error("track did not end after {0} commands")]
    Watchdog(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("track {} at byte offset {position:#06x}: {error}", .track + 1)]
pub struct TrackFault {
    pub track: usize,
    pub position: usize,
    pub error: TrackError,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion aborted with {0}")]
    TrackFaulted(TrackFault),

    #[error("too many tracks: {0} (max {max})", max = crate::score::MAX_TRACKS)]
    TooManyTracks(usize),

    #[error("track {} offset {offset:#06x} is outside the {len} byte buffer", .track + 1)]
    TrackOffsetOutOfBounds {
        track: usize,
        offset: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("file is too small ({0} bytes), not a valid MDX file")]
    TooSmall(usize),

    #[error("invalid pointers (title: {title_ptr:#06x}, voices: {voice_ptr:#06x}), use force mode to convert anyway")]
    InvalidPointers { title_ptr: u16, voice_ptr: u16 },

    #[error("invalid number of tracks: {0}, use force mode to convert anyway")]
    InvalidTrackCount(u8),

    #[error("track {} offset ({offset:#06x}) is past the end of the file ({len} bytes)", .track + 1)]
    TrackOffsetOutOfBounds {
        track: usize,
        offset: usize,
        len: usize,
    },

    #[error("no valid tracks found")]
    NoTracks,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingsError {
    #[error("voice {voice}: program {program} is not a MIDI program (0 - 127)")]
    InvalidProgram { voice: u8, program: u8 },

    #[error("voice {0} is mapped more than once")]
    DuplicateVoice(u8),
}

#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("unable to open {0}: {1}")]
    OpenError(String, io::Error),

    #[error("unable to read {0}: {1}")]
    SerdeError(String, serde_json::error::Error),

    #[error("invalid mappings in {0}: {list}", list = .1.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", "))]
    InvalidMappings(String, Vec<MappingsError>),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("error writing {0}: {1}")]
    WriteError(String, io::Error),

    #[error("error serializing {0}: {1}")]
    SerdeError(String, serde_json::error::Error),
}
