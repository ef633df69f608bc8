//! Track time, note lengths and gate ratios

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::errors::ValueError;
use crate::newtype_macros::u8_newtype;

use serde::Serialize;

/// MDX lengths are in 1/48ths of a beat.
pub const TICKS_PER_BEAT: u32 = 48;

// Percentage of the nominal note length that is sounded.
u8_newtype!(GateRatio, GateRatioOutOfRange, 10, 100);

pub const DEFAULT_GATE_RATIO: GateRatio = GateRatio(80);

impl GateRatio {
    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl Default for GateRatio {
    fn default() -> Self {
        DEFAULT_GATE_RATIO
    }
}

// TickCounter only moves backwards on a loop rewind
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct TickCounter {
    value: u32,
}

impl TickCounter {
    pub const fn new(value: u32) -> TickCounter {
        Self { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

impl std::ops::Add for TickCounter {
    type Output = Self;

    fn add(self, b: Self) -> Self {
        TickCounter {
            value: self.value.saturating_add(b.value),
        }
    }
}

impl std::ops::AddAssign for TickCounter {
    fn add_assign(&mut self, b: Self) {
        self.value = self.value.saturating_add(b.value);
    }
}

/// A note length after the gate ratio has been applied.
///
/// Stored in hundredths of a tick so `length * gate_ratio` is exact.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Serialize)]
#[serde(transparent)]
pub struct GatedLength {
    centiticks: u32,
}

impl GatedLength {
    pub fn new(length: TickCounter, gate: GateRatio) -> Self {
        Self {
            centiticks: length.value() * u32::from(gate.as_u8()),
        }
    }

    pub fn centiticks(&self) -> u32 {
        self.centiticks
    }

    /// Converts to a tick count `multiplier` times finer than the MDX tick, rounding to nearest.
    pub fn to_scaled_ticks(&self, multiplier: u32) -> u32 {
        (self.centiticks * multiplier + 50) / 100
    }
}
