//! Instrument mappings JSON file

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::errors::{DeserializeError, MappingsError};
use crate::events::MidiValue;
use crate::mappers::{InstrumentFallback, InstrumentMap, DEFAULT_VOICE_TABLE};

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoiceMapping {
    pub voice: u8,
    pub program: u8,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstrumentMappings {
    #[serde(default)]
    pub fallback: InstrumentFallback,

    #[serde(default)]
    pub instruments: Vec<VoiceMapping>,
}

impl InstrumentMappings {
    /// Builds the voice to program map.
    ///
    /// `instruments` entries override the built-in voice table per voice,
    /// voices in neither use the `fallback`.
    pub fn build_instrument_map(&self) -> Result<InstrumentMap, Vec<MappingsError>> {
        let mut errors = Vec::new();
        let mut voices = HashSet::with_capacity(self.instruments.len());

        let mut table: Vec<(u8, MidiValue)> = DEFAULT_VOICE_TABLE
            .iter()
            .map(|&(v, p)| (v, MidiValue::new_clamped(p)))
            .collect();

        for m in &self.instruments {
            if !voices.insert(m.voice) {
                errors.push(MappingsError::DuplicateVoice(m.voice));
                continue;
            }

            match MidiValue::try_from(m.program) {
                Ok(p) => table.push((m.voice, p)),
                Err(_) => errors.push(MappingsError::InvalidProgram {
                    voice: m.voice,
                    program: m.program,
                }),
            }
        }

        if errors.is_empty() {
            Ok(InstrumentMap::new(&table, self.fallback))
        } else {
            Err(errors)
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

pub fn load_mappings_file(path: &Path) -> Result<InstrumentMappings, DeserializeError> {
    let file_name = file_name(path);

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => return Err(DeserializeError::OpenError(file_name, e)),
    };
    let reader = BufReader::new(file);

    match serde_json::from_reader(reader) {
        Ok(m) => Ok(m),
        Err(e) => Err(DeserializeError::SerdeError(file_name, e)),
    }
}

/// Loads a mappings file and builds the instrument map.
pub fn load_instrument_map(path: &Path) -> Result<InstrumentMap, DeserializeError> {
    let mappings = load_mappings_file(path)?;

    mappings
        .build_instrument_map()
        .map_err(|e| DeserializeError::InvalidMappings(file_name(path), e))
}

pub fn mappings_from_str(s: &str) -> Result<InstrumentMappings, serde_json::Error> {
    serde_json::from_str(s)
}
