//! MDX file header
//!
//! ```text
//! 0x00  u16le  title pointer
//! 0x02  u16le  voice data pointer
//! 0x06  u8     number of tracks
//! 0x07  u16le  track offsets (one per track)
//! ```
//!
//! In force mode a malformed header is recovered as best as possible instead
//! of being rejected.

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::bytecode::opcodes;
use crate::errors::HeaderError;
use crate::score::MAX_TRACKS;

use codepage_strings::Coding;
use log::{info, warn};

pub const MIN_HEADER_SIZE: usize = 7;

const N_TRACKS_OFFSET: usize = 6;
const TRACK_OFFSETS_OFFSET: usize = 7;

const MAX_POINTER: u16 = 0x1000;
const MAX_HEADER_TRACKS: u8 = (MAX_TRACKS * 2) as u8;

const MAX_TITLE_LENGTH: usize = 50;

const SHIFT_JIS_CODE_PAGE: u16 = 932;

// Force mode recovery constants
const POINTER_SCAN_LIMIT: usize = 0x100;
const TRACK_SCAN_LIMIT: usize = 0x1000;
const TRACK_SCAN_STEP: usize = 0x100;
const TRACK_SCAN_WINDOW: usize = 100;
const FALLBACK_TRACK_OFFSET: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdxHeader {
    pub title_ptr: u16,
    pub voice_ptr: u16,
    pub title: Option<String>,
    pub track_offsets: Vec<usize>,
}

fn read_u16(data: &[u8], addr: usize) -> Option<u16> {
    data.get(addr..addr + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

pub fn parse_header(data: &[u8], force: bool) -> Result<MdxHeader, HeaderError> {
    if data.len() < MIN_HEADER_SIZE {
        return Err(HeaderError::TooSmall(data.len()));
    }

    let title_ptr = read_u16(data, 0).unwrap_or(0);
    let voice_ptr = read_u16(data, 2).unwrap_or(0);

    let mut shift_jis = true;

    if title_ptr > MAX_POINTER || voice_ptr > MAX_POINTER {
        warn!(
            "Unusual pointers: title {:#06x}, voices {:#06x}",
            title_ptr, voice_ptr
        );
        if !force {
            return Err(HeaderError::InvalidPointers {
                title_ptr,
                voice_ptr,
            });
        }
        shift_jis = false;
    }

    let title = read_title(data, title_ptr, voice_ptr, shift_jis);
    match &title {
        Some(t) => info!("Title: {}", t),
        None => warn!("Cannot read the title"),
    }

    let mut n_tracks = data[N_TRACKS_OFFSET];
    if n_tracks == 0 || n_tracks > MAX_HEADER_TRACKS {
        warn!("Invalid number of tracks: {}", n_tracks);
        if !force {
            return Err(HeaderError::InvalidTrackCount(n_tracks));
        }
        n_tracks = MAX_TRACKS as u8;
    }
    if usize::from(n_tracks) > MAX_TRACKS && force {
        n_tracks = recover_track_count(data);
    }
    info!("Tracks: {}", n_tracks);

    let mut track_offsets = Vec::with_capacity(MAX_TRACKS);

    for i in 0..usize::from(n_tracks).min(MAX_TRACKS) {
        let offset = match read_u16(data, TRACK_OFFSETS_OFFSET + i * 2) {
            Some(o) => usize::from(o),
            None => {
                warn!("Track {} offset is missing", i + 1);
                break;
            }
        };

        if offset >= data.len() {
            warn!(
                "Track {} offset ({:#06x}) is past the end of the file",
                i + 1,
                offset
            );
            if !force {
                return Err(HeaderError::TrackOffsetOutOfBounds {
                    track: i,
                    offset,
                    len: data.len(),
                });
            }
            continue;
        }

        track_offsets.push(offset);
    }

    if track_offsets.is_empty() {
        warn!("No valid tracks found");
        if !force {
            return Err(HeaderError::NoTracks);
        }
        track_offsets.extend(find_track_data(data));
    }

    if track_offsets.is_empty() {
        return Err(HeaderError::NoTracks);
    }

    Ok(MdxHeader {
        title_ptr,
        voice_ptr,
        title,
        track_offsets,
    })
}

fn read_title(data: &[u8], title_ptr: u16, voice_ptr: u16, shift_jis: bool) -> Option<String> {
    let start = usize::from(title_ptr);
    let remaining = data.get(start..)?;

    let end = match remaining.iter().position(|&b| b == 0) {
        Some(p) => start + p,
        None => usize::from(voice_ptr).min(start + MAX_TITLE_LENGTH),
    };
    if end <= start || end > data.len() {
        return None;
    }
    let bytes = &data[start..end];

    if shift_jis {
        match Coding::new(SHIFT_JIS_CODE_PAGE) {
            Ok(coding) => Some(coding.decode_lossy(bytes).into_owned()),
            Err(e) => {
                warn!("Cannot decode Shift-JIS title: {:?}", e);
                None
            }
        }
    } else {
        Some(bytes.iter().filter(|b| b.is_ascii()).map(|&b| char::from(b)).collect())
    }
}

// Guesses the track count of a non-standard header from the first plausible pointer.
fn recover_track_count(data: &[u8]) -> u8 {
    warn!("Non-standard MDX header, guessing the track count");

    let limit = POINTER_SCAN_LIMIT.min(data.len().saturating_sub(2));

    let first_pointer = (0..limit)
        .step_by(2)
        .find(|&i| match read_u16(data, i) {
            Some(p) => usize::from(p) >= 0x10 && usize::from(p) < data.len().saturating_sub(10),
            None => false,
        });

    match first_pointer.and_then(|i| data.get(i + N_TRACKS_OFFSET)) {
        Some(&n) => {
            let n = n.min(MAX_TRACKS as u8);
            info!("Estimated number of tracks: {}", n);
            n
        }
        None => {
            warn!("Cannot estimate the number of tracks, using 1");
            1
        }
    }
}

// Searches for a window of bytes that looks like track data.
fn find_track_data(data: &[u8]) -> Option<usize> {
    const MARKERS: [u8; 3] = [opcodes::TEMPO, opcodes::VOLUME, opcodes::INSTRUMENT];

    let limit = data.len().saturating_sub(TRACK_SCAN_WINDOW).min(TRACK_SCAN_LIMIT);

    let found = (0..limit).step_by(TRACK_SCAN_STEP).find(|&i| {
        data.get(i..i + TRACK_SCAN_WINDOW)
            .is_some_and(|w| w.iter().any(|b| MARKERS.contains(b)))
    });

    match found {
        Some(o) => {
            info!("Possible track data found at {:#06x}", o);
            Some(o)
        }
        None if data.len() > FALLBACK_TRACK_OFFSET => {
            warn!("No track data found, using the default offset");
            Some(FALLBACK_TRACK_OFFSET)
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // title at 0x20, voices at 0x28, track data at 0x30
    fn mdx_file(n_tracks: u8, offsets: &[u16], body: &[u8]) -> Vec<u8> {
        let mut d = vec![0x20, 0x00, 0x28, 0x00, 0x00, 0x00, n_tracks];
        for o in offsets {
            d.extend(o.to_le_bytes());
        }
        d.resize(0x20, 0);
        d.extend(b"Test\0");
        d.resize(0x30, 0);
        d.extend(body);
        d
    }

    #[test]
    fn test_valid_header() {
        let data = mdx_file(1, &[0x30], &[0x00, 0x10]);
        let h = parse_header(&data, false).unwrap();

        assert_eq!(h.title_ptr, 0x20);
        assert_eq!(h.voice_ptr, 0x28);
        assert_eq!(h.title.as_deref(), Some("Test"));
        assert_eq!(h.track_offsets, vec![0x30]);
    }

    #[test]
    fn test_shift_jis_title() {
        let mut data = mdx_file(1, &[0x30], &[0x00, 0x10]);
        // "テスト"
        data[0x20..0x27].copy_from_slice(&[0x83, 0x65, 0x83, 0x58, 0x83, 0x67, 0x00]);

        let h = parse_header(&data, false).unwrap();
        assert_eq!(h.title.as_deref(), Some("テスト"));
    }

    #[test]
    fn test_too_small() {
        assert_eq!(
            parse_header(&[0, 0, 0], false),
            Err(HeaderError::TooSmall(3))
        );
        assert_eq!(parse_header(&[0, 0, 0], true), Err(HeaderError::TooSmall(3)));
    }

    #[test]
    fn test_invalid_pointers() {
        let mut data = mdx_file(1, &[0x30], &[0x00, 0x10]);
        data[1] = 0x20;

        assert_eq!(
            parse_header(&data, false),
            Err(HeaderError::InvalidPointers {
                title_ptr: 0x2020,
                voice_ptr: 0x0028
            })
        );

        let h = parse_header(&data, true).unwrap();
        assert_eq!(h.title, None);
        assert_eq!(h.track_offsets, vec![0x30]);
    }

    #[test]
    fn test_invalid_track_count() {
        let data = mdx_file(0, &[0x30], &[0x00, 0x10]);
        assert_eq!(
            parse_header(&data, false),
            Err(HeaderError::InvalidTrackCount(0))
        );

        let data = mdx_file(33, &[0x30], &[0x00, 0x10]);
        assert_eq!(
            parse_header(&data, false),
            Err(HeaderError::InvalidTrackCount(33))
        );
    }

    #[test]
    fn test_track_offset_past_end() {
        let data = mdx_file(2, &[0x30, 0x400], &[0x00, 0x10]);

        assert_eq!(
            parse_header(&data, false),
            Err(HeaderError::TrackOffsetOutOfBounds {
                track: 1,
                offset: 0x400,
                len: 0x32
            })
        );

        let h = parse_header(&data, true).unwrap();
        assert_eq!(h.track_offsets, vec![0x30]);
    }

    #[test]
    fn test_force_mode_searches_for_track_data() {
        let mut data = mdx_file(1, &[0x1000], &[]);
        data.resize(0x300, 0);
        data[0x150] = opcodes::TEMPO;

        assert_eq!(
            parse_header(&data, false),
            Err(HeaderError::TrackOffsetOutOfBounds {
                track: 0,
                offset: 0x1000,
                len: 0x300,
            })
        );

        let h = parse_header(&data, true).unwrap();
        assert_eq!(h.track_offsets, vec![0x100]);
    }
}
