//! Standard MIDI File and JSON output

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::errors::ExportError;
use crate::events::Event;
use crate::mappers::DEFAULT_BPM;
use crate::score::{Score, TrackOutput};
use crate::time::TICKS_PER_BEAT;

use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

pub const MIDI_TICKS_PER_BEAT: u16 = 480;

/// MIDI ticks per MDX tick.
pub const TICK_MULTIPLIER: u32 = MIDI_TICKS_PER_BEAT as u32 / TICKS_PER_BEAT;

const MIDI_CHANNELS: usize = 16;

// Largest delta-time a variable length quantity can hold
const MAX_DELTA: u32 = 0x0fff_ffff;

const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
const MAX_TEMPO_VALUE: u32 = 0x00ff_ffff;

pub fn bpm_to_midi_tempo(bpm: f64) -> u24 {
    let t = if bpm > 0.0 {
        (MICROSECONDS_PER_MINUTE / bpm).round()
    } else {
        f64::from(MAX_TEMPO_VALUE)
    };
    let t = (t as u32).clamp(1, MAX_TEMPO_VALUE);

    u24::from(t)
}

pub fn track_name(track: &TrackOutput) -> String {
    format!("Track {}", track.index + 1)
}

// Note-offs are sorted before every other event at the same time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Priority {
    NoteOff,
    Other,
}

struct TimedEvent<'a> {
    time: u32,
    priority: Priority,
    kind: TrackEventKind<'a>,
}

fn build_track<'a>(track: &TrackOutput, name: &'a str) -> Vec<TrackEvent<'a>> {
    let channel = u4::from((track.index % MIDI_CHANNELS) as u8);

    let midi = |message| TrackEventKind::Midi { channel, message };

    let mut events = Vec::with_capacity(track.events.len() * 2 + 4);

    let mut push = |time: u32, priority, kind| {
        events.push(TimedEvent {
            time,
            priority,
            kind,
        })
    };

    push(
        0,
        Priority::Other,
        TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    );
    push(
        0,
        Priority::Other,
        TrackEventKind::Meta(MetaMessage::Tempo(bpm_to_midi_tempo(DEFAULT_BPM))),
    );
    push(
        0,
        Priority::Other,
        midi(MidiMessage::ProgramChange { program: u7::from(0) }),
    );

    for e in &track.events {
        let time = e.time().value().saturating_mul(TICK_MULTIPLIER);

        match e {
            Event::NoteOn {
                note,
                duration,
                velocity,
                ..
            } => {
                let key = u7::from(note.as_u8());

                // A zero length note-off would be sorted before its note-on
                let length = duration.to_scaled_ticks(TICK_MULTIPLIER).max(1);

                push(
                    time,
                    Priority::Other,
                    midi(MidiMessage::NoteOn {
                        key,
                        vel: u7::from(velocity.as_u8()),
                    }),
                );
                push(
                    time.saturating_add(length),
                    Priority::NoteOff,
                    midi(MidiMessage::NoteOff {
                        key,
                        vel: u7::from(0),
                    }),
                );
            }
            Event::ControllerChange {
                controller, value, ..
            } => push(
                time,
                Priority::Other,
                midi(MidiMessage::Controller {
                    controller: u7::from(*controller),
                    value: u7::from(value.as_u8()),
                }),
            ),
            Event::ProgramChange { program, .. } => push(
                time,
                Priority::Other,
                midi(MidiMessage::ProgramChange {
                    program: u7::from(program.as_u8()),
                }),
            ),
            Event::TempoChange { bpm, .. } => push(
                time,
                Priority::Other,
                TrackEventKind::Meta(MetaMessage::Tempo(bpm_to_midi_tempo(*bpm))),
            ),
            Event::PitchBend { value, .. } => push(
                time,
                Priority::Other,
                midi(MidiMessage::PitchBend {
                    bend: midly::PitchBend(u14::from(value.as_u16())),
                }),
            ),
        }
    }

    // stable sort
    events.sort_by_key(|e| (e.time, e.priority));

    let mut out = Vec::with_capacity(events.len() + 1);
    let mut previous = 0;

    for e in events {
        let mut delta = e.time - previous;

        // Long rests are padded with empty markers
        while delta > MAX_DELTA {
            out.push(TrackEvent {
                delta: u28::from(MAX_DELTA),
                kind: TrackEventKind::Meta(MetaMessage::Marker(&[])),
            });
            delta -= MAX_DELTA;
        }

        out.push(TrackEvent {
            delta: u28::from(delta),
            kind: e.kind,
        });
        previous = e.time;
    }

    out.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    out
}

/// Builds a format 1 MIDI file with one MIDI track per score track.
///
/// Faulted tracks are written with the events produced before the fault.
pub fn build_smf<'a>(score: &Score, track_names: &'a [String]) -> Smf<'a> {
    let header = Header::new(
        Format::Parallel,
        Timing::Metrical(u15::from(MIDI_TICKS_PER_BEAT)),
    );

    let tracks = score
        .tracks()
        .iter()
        .zip(track_names)
        .map(|(t, name)| build_track(t, name))
        .collect();

    Smf { header, tracks }
}

pub fn smf_bytes(score: &Score) -> io::Result<Vec<u8>> {
    let names: Vec<String> = score.tracks().iter().map(track_name).collect();
    let smf = build_smf(score, &names);

    let mut out = Vec::new();
    smf.write_std(&mut out)?;

    Ok(out)
}

pub fn save_smf(score: &Score, path: &Path) -> Result<(), ExportError> {
    let file_name = path.display().to_string();

    let data = match smf_bytes(score) {
        Ok(d) => d,
        Err(e) => return Err(ExportError::WriteError(file_name, e)),
    };

    match fs::write(path, data) {
        Ok(()) => Ok(()),
        Err(e) => Err(ExportError::WriteError(file_name, e)),
    }
}

pub fn save_score_json(score: &Score, path: &Path) -> Result<(), ExportError> {
    let file_name = path.display().to_string();

    let file = match File::create(path) {
        Ok(f) => f,
        Err(e) => return Err(ExportError::WriteError(file_name, e)),
    };
    let writer = BufWriter::new(file);

    match serde_json::to_writer_pretty(writer, score) {
        Ok(()) => Ok(()),
        Err(e) => Err(ExportError::SerdeError(file_name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ConversionOptions;
    use crate::mappers::InstrumentMap;
    use crate::score::convert;

    fn score(data: &[u8], offsets: &[usize]) -> Score {
        convert(
            data,
            offsets,
            &ConversionOptions::default(),
            &InstrumentMap::default(),
        )
        .unwrap()
    }

    fn midi_events(track: &[TrackEvent]) -> Vec<(u32, MidiMessage)> {
        let mut time = 0;
        let mut out = Vec::new();
        for e in track {
            time += e.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = e.kind {
                out.push((time, message));
            }
        }
        out
    }

    #[test]
    fn test_tempo() {
        assert_eq!(bpm_to_midi_tempo(120.0).as_int(), 500_000);
        assert_eq!(bpm_to_midi_tempo(1228.8).as_int(), 48_828);
        assert_eq!(bpm_to_midi_tempo(0.0).as_int(), MAX_TEMPO_VALUE);
        assert_eq!(bpm_to_midi_tempo(1.0).as_int(), MAX_TEMPO_VALUE);
    }

    #[test]
    fn test_smf_header_and_tracks() {
        let data = [0x80 | 60, 0x30, 0x64, 0xeb, 0x50];
        let s = score(&data, &[0, 3]);

        let bytes = smf_bytes(&s).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::from(480)));
        assert_eq!(smf.tracks.len(), 2);

        for (i, t) in smf.tracks.iter().enumerate() {
            let name = format!("Track {}", i + 1);
            assert_eq!(
                t[0].kind,
                TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))
            );
            assert_eq!(
                t.last().map(|e| e.kind),
                Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
            );
            assert!(t.iter().all(|e| match e.kind {
                TrackEventKind::Midi { channel, .. } => channel.as_int() == i as u8,
                _ => true,
            }));
        }
    }

    #[test]
    fn test_note_off_uses_gate_ratio() {
        // 48 ticks (one beat) at the default 80% gate
        let data = [0x80 | 60, 0x30, 0x64];
        let s = score(&data, &[0]);

        let bytes = smf_bytes(&s).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(
            midi_events(&smf.tracks[0]),
            vec![
                (0, MidiMessage::ProgramChange { program: 0.into() }),
                (
                    0,
                    MidiMessage::NoteOn {
                        key: 60.into(),
                        vel: 0x64.into()
                    }
                ),
                (
                    384,
                    MidiMessage::NoteOff {
                        key: 60.into(),
                        vel: 0.into()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_note_off_sorted_before_note_on() {
        // gate 100%, two consecutive notes
        let data = [0xe9, 100, 0x80 | 60, 0x10, 0x64, 0x80 | 62, 0x10, 0x64];
        let s = score(&data, &[0]);

        let bytes = smf_bytes(&s).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let events = midi_events(&smf.tracks[0]);

        assert_eq!(events.len(), 5);
        assert!(matches!(events[2], (160, MidiMessage::NoteOff { .. })));
        assert!(matches!(events[3], (160, MidiMessage::NoteOn { .. })));
    }

    #[test]
    fn test_controllers_and_pitch_bend() {
        let data = [0xeb, 0x50, 0xec, 0x00, 0xea, 0x00, 0x10, 0x00, 0x30];
        let s = score(&data, &[0]);

        let bytes = smf_bytes(&s).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(
            midi_events(&smf.tracks[0]),
            vec![
                (0, MidiMessage::ProgramChange { program: 0.into() }),
                (
                    0,
                    MidiMessage::Controller {
                        controller: 7.into(),
                        value: 0x50.into()
                    }
                ),
                (
                    0,
                    MidiMessage::Controller {
                        controller: 10.into(),
                        value: 0.into()
                    }
                ),
                (
                    0,
                    MidiMessage::PitchBend {
                        bend: midly::PitchBend(u14::from(8192 + 0x400))
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_long_rests_are_split() {
        let mut data = [0x00_u8, 0xff].repeat(110_000);
        data.extend([0x80 | 60, 0x10, 0x7f]);
        let s = score(&data, &[0]);

        let bytes = smf_bytes(&s).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let track = &smf.tracks[0];

        assert!(track.iter().all(|e| e.delta.as_int() <= MAX_DELTA));
        assert_eq!(
            track
                .iter()
                .filter(|e| e.kind == TrackEventKind::Meta(MetaMessage::Marker(b"")))
                .count(),
            1
        );

        let note_on = MidiMessage::NoteOn {
            key: 60.into(),
            vel: 0x7f.into(),
        };
        let events = midi_events(track);
        assert!(events.contains(&(280_500_000, note_on)));
    }

    #[test]
    fn test_json_dump() {
        let data = [0xe7, 200, 0x80 | 60, 0x30, 0x64];
        let s = score(&data, &[0]);

        let json = serde_json::to_value(&s).unwrap();
        let events = &json["tracks"][0]["events"];

        assert_eq!(events[0]["type"], "tempo_change");
        assert_eq!(events[0]["bpm"], 1228.8);
        assert_eq!(events[1]["type"], "note_on");
        assert_eq!(events[1]["note"], 60);
        assert_eq!(json["tracks"][0]["status"]["status"], "done");
    }
}
