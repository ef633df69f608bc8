//! MDX track interpreter

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::bytecode::{decode_command, operand_spec, Command, CommandKind, LfoSettings};
use crate::cursor::ByteCursor;
use crate::errors::{DecodeError, TrackError, TrackFault};
use crate::events::{controllers, Event, MidiValue};
use crate::mappers::{
    detune_to_pitch_bend, tempo_to_bpm, InstrumentMap, Pan, FALLBACK_TEMPO_VALUE,
};
use crate::registers::translate_register_write;
use crate::score::{TrackOutput, TrackStatus};
use crate::time::{GateRatio, GatedLength, TickCounter};

use log::{debug, warn};

pub const DEFAULT_MAX_LOOPS: u8 = 2;

/// Loop count meaning "repeat forever".
pub const INFINITE_LOOP_COUNT: u8 = 255;

pub const MAX_LOOP_DEPTH: usize = 16;

// Prevent infinite loops by limiting the number of processed commands
pub const WATCHDOG_COMMANDS: u32 = 250_000;

pub const STARTING_VOLUME: u8 = 100;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Maximum number of times a loop body is played.  0 disables repeats.
    pub max_loops: u8,

    /// Abort the conversion if any track faults.
    pub strict: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            max_loops: DEFAULT_MAX_LOOPS,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackState {
    pub time: TickCounter,
    pub gate_ratio: GateRatio,
    pub detune: i16,
    pub portamento: i16,
    pub pan: Pan,
    pub volume: MidiValue,
    pub expression: MidiValue,
    pub instrument_id: u8,

    // Not emulating LFOs or key-on delay
    pub lfo: LfoSettings,
    pub key_on_delay: u8,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            time: TickCounter::new(0),
            gate_ratio: GateRatio::default(),
            detune: 0,
            portamento: 0,
            pan: Pan::Center,
            volume: MidiValue::new_clamped(STARTING_VOLUME),
            expression: MidiValue::MAX,
            instrument_id: 0,
            lfo: LfoSettings::default(),
            key_on_delay: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoopFrame {
    pub return_position: usize,
    pub return_time: TickCounter,
    // 0 until the loop end has been read once
    pub remaining_iterations: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterState {
    Running,
    Faulted(TrackFault),
    Done,
}

/// Total number of times a loop body is played for a loop end `count`.
///
/// Always >= 1, the first pass has already been played when the loop end is read.
pub fn loop_pass_count(count: u8, max_loops: u8) -> u8 {
    match (count, max_loops) {
        (_, 0) => 1,
        (0, _) => 1,
        (INFINITE_LOOP_COUNT, m) => m,
        (c, m) => c.min(m),
    }
}

pub struct TrackInterpreter<'a> {
    track: usize,
    offset: usize,
    cursor: ByteCursor<'a>,
    max_loops: u8,
    instruments: &'a InstrumentMap,

    state: InterpreterState,
    s: TrackState,
    loop_stack: Vec<LoopFrame>,
    events: Vec<Event>,
    n_commands: u32,
}

impl<'a> TrackInterpreter<'a> {
    pub fn new(
        data: &'a [u8],
        track: usize,
        offset: usize,
        max_loops: u8,
        instruments: &'a InstrumentMap,
    ) -> Self {
        let cursor = ByteCursor::new(data, offset);

        let state = match cursor.is_at_end() {
            true => InterpreterState::Done,
            false => InterpreterState::Running,
        };

        Self {
            track,
            offset,
            cursor,
            max_loops,
            instruments,
            state,
            s: TrackState::default(),
            loop_stack: Vec::new(),
            events: Vec::new(),
            n_commands: 0,
        }
    }

    pub fn state(&self) -> &InterpreterState {
        &self.state
    }

    pub fn track_state(&self) -> &TrackState {
        &self.s
    }

    pub fn loop_stack(&self) -> &[LoopFrame] {
        &self.loop_stack
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Processes a single command.
    pub fn step(&mut self) -> &InterpreterState {
        if self.state != InterpreterState::Running {
            return &self.state;
        }

        if self.n_commands >= WATCHDOG_COMMANDS {
            warn!(
                "Track {}: watchdog limit of {} commands reached with max loops {}",
                self.track + 1,
                WATCHDOG_COMMANDS,
                self.max_loops
            );
            self.fault(self.cursor.position(), TrackError::Watchdog(WATCHDOG_COMMANDS));
            return &self.state;
        }
        self.n_commands += 1;

        let position = self.cursor.position();

        match self.process_next_command() {
            Ok(()) => {
                if self.cursor.is_at_end() {
                    self.state = InterpreterState::Done;
                }
            }
            Err(e) => self.fault(position, e),
        }

        &self.state
    }

    pub fn run(mut self) -> TrackOutput {
        while self.step() == &InterpreterState::Running {}

        let status = match self.state {
            InterpreterState::Faulted(f) => TrackStatus::Faulted(f),
            InterpreterState::Running | InterpreterState::Done => TrackStatus::Done,
        };

        TrackOutput {
            index: self.track,
            offset: self.offset,
            events: self.events,
            end_time: self.s.time,
            status,
        }
    }

    fn fault(&mut self, position: usize, error: TrackError) {
        warn!("Track {}: {}", self.track + 1, error);

        self.state = InterpreterState::Faulted(TrackFault {
            track: self.track,
            position,
            error,
        });
    }

    fn process_next_command(&mut self) -> Result<(), TrackError> {
        let decoded = match decode_command(&mut self.cursor) {
            Ok(d) => d,
            Err(DecodeError::Truncated {
                opcode, position, ..
            }) if operand_spec(opcode).kind == CommandKind::Unknown => {
                warn!(
                    "Track {}: command 0x{:02x} at {:#06x} is incomplete, ending track",
                    self.track + 1,
                    opcode,
                    position
                );
                self.cursor.seek_to_end();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let time = self.s.time;

        match decoded.command {
            Command::Note {
                note,
                length,
                velocity,
            } => {
                if self.s.detune != 0 {
                    self.events.push(Event::PitchBend {
                        time,
                        value: detune_to_pitch_bend(self.s.detune),
                    });
                }
                self.events.push(Event::NoteOn {
                    time,
                    note,
                    duration: GatedLength::new(length, self.s.gate_ratio),
                    velocity,
                });
                self.s.time += length;
            }

            Command::Rest { length } => {
                self.s.time += length;
            }

            Command::Tempo(t) => {
                if t == 0 {
                    warn!(
                        "Track {}: invalid tempo (0) at {:#06x}, using {}",
                        self.track + 1,
                        decoded.position,
                        FALLBACK_TEMPO_VALUE
                    );
                }
                let bpm = tempo_to_bpm(t);
                debug!("Tempo: {} bpm", bpm);

                self.events.push(Event::TempoChange { time, bpm });
            }

            Command::Volume(v) => {
                self.s.volume = MidiValue::new_clamped(v);
                self.events.push(Event::ControllerChange {
                    time,
                    controller: controllers::VOLUME,
                    value: self.s.volume,
                });
            }

            Command::Instrument(i) => {
                self.s.instrument_id = i;
                self.events.push(Event::ProgramChange {
                    time,
                    program: self.instruments.program(i),
                });
            }

            Command::Pan(p) => {
                self.s.pan = Pan::from_mdx(p);
                self.events.push(Event::ControllerChange {
                    time,
                    controller: controllers::PAN,
                    value: self.s.pan.midi_value(),
                });
            }

            Command::Detune(d) => {
                self.s.detune = d;
                self.events.push(Event::PitchBend {
                    time,
                    value: detune_to_pitch_bend(d),
                });
            }

            Command::Portamento(p) => {
                // Not emulating the glide, bending straight to the target
                self.s.portamento = p;
                self.events.push(Event::PitchBend {
                    time,
                    value: detune_to_pitch_bend(p),
                });
            }

            Command::GateTime(g) => {
                // No MIDI controller for gate time, applied to the note-off time
                self.s.gate_ratio = GateRatio::new_clamped(g);
                debug!("Gate ratio: {}", self.s.gate_ratio.as_fraction());
            }

            Command::LoopStart => self.start_loop()?,
            Command::LoopEnd { count } => self.end_loop(count, decoded.position),

            Command::Lfo(lfo) => {
                debug!("LFO: flags {:#04x}", lfo.flags);
                self.s.lfo = lfo;
            }

            Command::RegisterWrite { register, value } => {
                if let Some(e) = translate_register_write(register, value, &mut self.s, time) {
                    self.events.push(e);
                }
            }

            Command::KeyOnDelay(d) => {
                self.s.key_on_delay = d;
            }

            Command::Unknown { opcode, skipped } => {
                debug!(
                    "Track {}: skipping unknown command 0x{:02x} ({} bytes) at {:#06x}",
                    self.track + 1,
                    opcode,
                    skipped,
                    decoded.position
                );
            }
        }

        Ok(())
    }

    fn start_loop(&mut self) -> Result<(), TrackError> {
        if self.loop_stack.len() >= MAX_LOOP_DEPTH {
            return Err(TrackError::LoopStackOverflow {
                max_depth: MAX_LOOP_DEPTH,
            });
        }

        debug!(
            "Loop start: {:#06x}, time: {}",
            self.cursor.position(),
            self.s.time.value()
        );

        self.loop_stack.push(LoopFrame {
            return_position: self.cursor.position(),
            return_time: self.s.time,
            remaining_iterations: 0,
        });

        Ok(())
    }

    fn end_loop(&mut self, count: u8, position: usize) {
        let max_loops = self.max_loops;

        let frame = match self.loop_stack.last_mut() {
            Some(f) => f,
            None => {
                warn!(
                    "Track {}: loop end without a loop start at {:#06x}, ignoring",
                    self.track + 1,
                    position
                );
                return;
            }
        };

        let remaining = if max_loops == 0 {
            0
        } else if frame.remaining_iterations > 0 {
            // The count is only read on the first pass
            frame.remaining_iterations - 1
        } else {
            let passes = loop_pass_count(count, max_loops);
            if count != INFINITE_LOOP_COUNT && passes < count {
                debug!("Limiting loop count from {} to {}", count, passes);
            }
            passes - 1
        };

        if remaining > 0 {
            frame.remaining_iterations = remaining;

            let (p, t) = (frame.return_position, frame.return_time);
            self.cursor.seek(p);
            self.s.time = t;

            debug!("Loop rewind: {:#06x}, {} remaining", p, remaining);
        } else {
            self.loop_stack.pop();
            debug!("Loop end");
        }
    }
}

/// Interprets a single track to the end of the data or the first fault.
pub fn interpret_track(
    data: &[u8],
    track: usize,
    offset: usize,
    max_loops: u8,
    instruments: &InstrumentMap,
) -> TrackOutput {
    TrackInterpreter::new(data, track, offset, max_loops, instruments).run()
}
