//! Modulation routing: sources, destinations and the per-sample offset table.

/*
Modulation Routing
==================

Three sources can move parameters: the two LFOs (already scaled by their
`amount`) and the mod wheel. They reach parameters two ways:

  modulation slots    8 entries of { source, destination, amount }
  direct LFO routes   1 per LFO of { destination, depth }

Every sample the router clears a table of offsets, one per destination,
and adds `source × amount` (or `lfo × depth`) for each live entry. Two
entries aimed at the same destination SUM; nothing overwrites.

The voice then reads each parameter as:

    value = clamp(nominal + offset[destination], destination.range())

Clamping happens once, after the sum. Clamping each contribution on its own
would let one slot at the rail hide a second slot pulling the other way.


Destination Index Space
-----------------------

Host-side selectors address destinations by a flat index:

    0        None (inert sink)
    1 - 6    operator gain          [0, 1]
    7 - 12   operator ratio         [0.1, 20]
    13 - 18  operator context-1     [0, 1]
    19 - 54  matrix cell, row-major [-1, 1]    19 + row·6 + col

`Destination::from_index` is the only way in from a raw integer and it
rejects anything past 54. Inside the engine destinations are typed values,
so the render loop never bounds-checks an index it was handed.
*/

use std::fmt;

use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{dsp::clamp_finite, error::ParamError, NUM_LFOS, NUM_MOD_SLOTS, NUM_OPERATORS};

/// Number of addressable destinations, `None` included.
pub const DESTINATION_COUNT: usize = 1 + 3 * NUM_OPERATORS + NUM_OPERATORS * NUM_OPERATORS;

const GAIN_BASE: usize = 1;
const RATIO_BASE: usize = GAIN_BASE + NUM_OPERATORS;
const CONTEXT1_BASE: usize = RATIO_BASE + NUM_OPERATORS;
const MATRIX_BASE: usize = CONTEXT1_BASE + NUM_OPERATORS;

pub const GAIN_RANGE: (f32, f32) = (0.0, 1.0);
pub const RATIO_RANGE: (f32, f32) = (0.1, 20.0);
pub const CONTEXT_RANGE: (f32, f32) = (0.0, 1.0);
pub const MATRIX_RANGE: (f32, f32) = (-1.0, 1.0);
/// Not a modulation destination, but clamped the same way.
pub const KEY_TRACK_RANGE: (f32, f32) = (0.0, 1.0);

/// Index of one of the six operators, validated on construction.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpIndex(u8);

impl OpIndex {
    pub const ALL: [OpIndex; NUM_OPERATORS] = [
        OpIndex(0),
        OpIndex(1),
        OpIndex(2),
        OpIndex(3),
        OpIndex(4),
        OpIndex(5),
    ];

    pub fn new(index: usize) -> Result<Self, ParamError> {
        if index < NUM_OPERATORS {
            Ok(OpIndex(index as u8))
        } else {
            Err(ParamError::OperatorOutOfRange(index))
        }
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for OpIndex {
    type Error = ParamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        OpIndex::new(value as usize)
    }
}

impl From<OpIndex> for u8 {
    fn from(index: OpIndex) -> Self {
        index.0
    }
}

/// A parameter that modulation can move.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    /// Inert: contributions aimed here are dropped.
    #[default]
    None,
    OpGain(OpIndex),
    OpRatio(OpIndex),
    OpContext1(OpIndex),
    /// Matrix weight with which `source`'s output modulates `target`.
    MatrixCell { target: OpIndex, source: OpIndex },
}

impl Destination {
    /// Resolve a flat host-side index. Rejects anything past the matrix block.
    pub fn from_index(index: usize) -> Result<Self, ParamError> {
        let op = |i: usize| OpIndex(i as u8);
        match index {
            0 => Ok(Destination::None),
            i if i < RATIO_BASE => Ok(Destination::OpGain(op(i - GAIN_BASE))),
            i if i < CONTEXT1_BASE => Ok(Destination::OpRatio(op(i - RATIO_BASE))),
            i if i < MATRIX_BASE => Ok(Destination::OpContext1(op(i - CONTEXT1_BASE))),
            i if i < DESTINATION_COUNT => {
                let cell = i - MATRIX_BASE;
                Ok(Destination::MatrixCell {
                    target: op(cell / NUM_OPERATORS),
                    source: op(cell % NUM_OPERATORS),
                })
            }
            i => {
                warn!("rejected modulation destination index {}", i);
                Err(ParamError::DestinationOutOfRange(i))
            }
        }
    }

    pub fn op_gain(op: usize) -> Result<Self, ParamError> {
        OpIndex::new(op).map(Destination::OpGain)
    }

    pub fn op_ratio(op: usize) -> Result<Self, ParamError> {
        OpIndex::new(op).map(Destination::OpRatio)
    }

    pub fn op_context1(op: usize) -> Result<Self, ParamError> {
        OpIndex::new(op).map(Destination::OpContext1)
    }

    pub fn matrix_cell(target: usize, source: usize) -> Result<Self, ParamError> {
        Ok(Destination::MatrixCell {
            target: OpIndex::new(target)?,
            source: OpIndex::new(source)?,
        })
    }

    /// Flat index, the inverse of [`Destination::from_index`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Destination::None => 0,
            Destination::OpGain(op) => GAIN_BASE + op.get(),
            Destination::OpRatio(op) => RATIO_BASE + op.get(),
            Destination::OpContext1(op) => CONTEXT1_BASE + op.get(),
            Destination::MatrixCell { target, source } => {
                MATRIX_BASE + target.get() * NUM_OPERATORS + source.get()
            }
        }
    }

    /// Legal `(min, max)` for the modulated value.
    #[inline]
    pub fn range(self) -> (f32, f32) {
        match self {
            Destination::None => (f32::MIN, f32::MAX),
            Destination::OpGain(_) => GAIN_RANGE,
            Destination::OpRatio(_) => RATIO_RANGE,
            Destination::OpContext1(_) => CONTEXT_RANGE,
            Destination::MatrixCell { .. } => MATRIX_RANGE,
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Destination::None)
    }

    /// Every destination in index order.
    pub fn all() -> impl Iterator<Item = Destination> {
        (0..DESTINATION_COUNT).filter_map(|i| Destination::from_index(i).ok())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::None => write!(f, "None"),
            Destination::OpGain(op) => write!(f, "Op{} Gain", op.get()),
            Destination::OpRatio(op) => write!(f, "Op{} Ratio", op.get()),
            Destination::OpContext1(op) => write!(f, "Op{} C1", op.get()),
            Destination::MatrixCell { target, source } => {
                write!(f, "Mod {}->{}", source.get(), target.get())
            }
        }
    }
}

/// Signal that a modulation slot reads.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModSource {
    #[default]
    Lfo1,
    Lfo2,
    ModWheel,
}

impl ModSource {
    pub fn from_index(index: usize) -> Result<Self, ParamError> {
        match index {
            0 => Ok(ModSource::Lfo1),
            1 => Ok(ModSource::Lfo2),
            2 => Ok(ModSource::ModWheel),
            i => {
                warn!("rejected modulation source index {}", i);
                Err(ParamError::SourceOutOfRange(i))
            }
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModSlot {
    pub source: ModSource,
    pub destination: Destination,
    /// Signed depth, typically -1.0 to 1.0
    pub amount: f32,
}

impl ModSlot {
    /// Build a slot from host-side selector values.
    pub fn from_indices(
        source: usize,
        destination: usize,
        amount: f32,
    ) -> Result<Self, ParamError> {
        Ok(Self {
            source: ModSource::from_index(source)?,
            destination: Destination::from_index(destination)?,
            amount,
        })
    }
}

/// Hard-wired LFO route that bypasses the slot table.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectLfoRoute {
    pub destination: Destination,
    pub depth: f32,
}

impl DirectLfoRoute {
    pub fn from_index(destination: usize, depth: f32) -> Result<Self, ParamError> {
        Ok(Self {
            destination: Destination::from_index(destination)?,
            depth,
        })
    }
}

/// Source values for one sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModSources {
    /// LFO outputs, already scaled by their amount
    pub lfo: [f32; NUM_LFOS],
    pub mod_wheel: f32,
}

impl ModSources {
    #[inline]
    pub fn value(&self, source: ModSource) -> f32 {
        match source {
            ModSource::Lfo1 => self.lfo[0],
            ModSource::Lfo2 => self.lfo[1],
            ModSource::ModWheel => self.mod_wheel,
        }
    }
}

/// Additive offset per destination, rebuilt every sample.
#[derive(Debug, Clone)]
pub struct ModOffsets {
    values: [f32; DESTINATION_COUNT],
}

impl ModOffsets {
    pub fn new() -> Self {
        Self {
            values: [0.0; DESTINATION_COUNT],
        }
    }

    pub fn clear(&mut self) {
        self.values = [0.0; DESTINATION_COUNT];
    }

    /// Accumulate into `destination`. `None` swallows the contribution.
    #[inline]
    pub fn add(&mut self, destination: Destination, amount: f32) {
        if destination.is_none() {
            return;
        }
        self.values[destination.index()] += amount;
    }

    #[inline]
    pub fn get(&self, destination: Destination) -> f32 {
        if destination.is_none() {
            return 0.0;
        }
        self.values[destination.index()]
    }

    /// Nominal value plus its offset, clamped to the destination's range.
    #[inline]
    pub fn apply(&self, destination: Destination, nominal: f32) -> f32 {
        let (min, max) = destination.range();
        // NaN from a broken automation value must not reach the operators
        clamp_finite(nominal + self.get(destination), min, max)
    }

    /// Rebuild the table from the slot table and direct LFO routes.
    pub fn resolve(
        &mut self,
        slots: &[ModSlot; NUM_MOD_SLOTS],
        routes: &[DirectLfoRoute; NUM_LFOS],
        sources: &ModSources,
    ) {
        self.clear();

        for slot in slots.iter().filter(|s| !s.destination.is_none()) {
            self.add(slot.destination, sources.value(slot.source) * slot.amount);
        }

        for (route, &lfo) in routes.iter().zip(sources.lfo.iter()) {
            if !route.destination.is_none() {
                self.add(route.destination, lfo * route.depth);
            }
        }
    }
}

impl Default for ModOffsets {
    fn default() -> Self {
        Self::new()
    }
}
