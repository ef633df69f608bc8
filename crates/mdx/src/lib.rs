//! X68000 MDX sequence decoder

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

mod newtype_macros;

pub mod bytecode;
pub mod cursor;
pub mod errors;
pub mod events;
pub mod export;
pub mod header;
pub mod interpreter;
pub mod mappers;
pub mod mappings;
pub mod registers;
pub mod score;
pub mod time;

pub use header::{parse_header, MdxHeader};
pub use interpreter::{interpret_track, ConversionOptions};
pub use mappers::InstrumentMap;
pub use mappings::{load_instrument_map, load_mappings_file, InstrumentMappings};
pub use score::{assemble_score, convert, Score, TrackOutput, TrackStatus};
