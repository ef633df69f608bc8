//! Multi-track score assembly

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::errors::{ConversionError, TrackFault};
use crate::events::Event;
use crate::interpreter::{interpret_track, ConversionOptions};
use crate::mappers::InstrumentMap;
use crate::time::TickCounter;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

pub const MAX_TRACKS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "fault", rename_all = "snake_case")]
pub enum TrackStatus {
    Done,
    Faulted(TrackFault),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackOutput {
    pub index: usize,
    pub offset: usize,

    // Events are in interpretation order, which is chronological except on a loop rewind.
    pub events: Vec<Event>,
    pub end_time: TickCounter,

    pub status: TrackStatus,
}

impl TrackOutput {
    pub fn is_faulted(&self) -> bool {
        matches!(self.status, TrackStatus::Faulted(_))
    }

    pub fn fault(&self) -> Option<&TrackFault> {
        match &self.status {
            TrackStatus::Faulted(f) => Some(f),
            TrackStatus::Done => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    tracks: Vec<TrackOutput>,
}

impl Score {
    pub fn tracks(&self) -> &[TrackOutput] {
        &self.tracks
    }

    pub fn skipped_tracks(&self) -> impl Iterator<Item = &TrackOutput> {
        self.tracks.iter().filter(|t| t.is_faulted())
    }

    pub fn end_time(&self) -> TickCounter {
        self.tracks
            .iter()
            .map(|t| t.end_time)
            .max()
            .unwrap_or_default()
    }
}

/// Combines independently interpreted tracks into a score, ordered by track index.
///
/// In strict mode the lowest-indexed faulted track aborts the conversion.
pub fn assemble_score(
    mut tracks: Vec<TrackOutput>,
    strict: bool,
) -> Result<Score, ConversionError> {
    tracks.sort_by_key(|t| t.index);

    for t in &tracks {
        if let Some(f) = t.fault() {
            if strict {
                return Err(ConversionError::TrackFaulted(f.clone()));
            }
            warn!("Skipping {}", f);
        }
    }

    Ok(Score { tracks })
}

/// Interprets every track in parallel and assembles the score.
///
/// `track_offsets` MUST be bounds checked by the caller.
pub fn convert(
    data: &[u8],
    track_offsets: &[usize],
    options: &ConversionOptions,
    instruments: &InstrumentMap,
) -> Result<Score, ConversionError> {
    if track_offsets.len() > MAX_TRACKS {
        return Err(ConversionError::TooManyTracks(track_offsets.len()));
    }
    if let Some((track, &offset)) = track_offsets
        .iter()
        .enumerate()
        .find(|(_, &o)| o >= data.len())
    {
        return Err(ConversionError::TrackOffsetOutOfBounds {
            track,
            offset,
            len: data.len(),
        });
    }

    let tracks: Vec<TrackOutput> = track_offsets
        .par_iter()
        .enumerate()
        .map(|(i, &offset)| {
            info!("Interpreting track {} at {:#06x}", i + 1, offset);
            interpret_track(data, i, offset, options.max_loops, instruments)
        })
        .collect();

    assemble_score(tracks, options.strict)
}
