//! The parameter snapshot a voice renders from.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{envelope::EnvelopeParams, lfo::LfoParams, OperatorMode},
    error::ParamError,
    synth::modulation::{DirectLfoRoute, ModSlot},
    NUM_ENVELOPES, NUM_LFOS, NUM_MOD_SLOTS, NUM_OPERATORS,
};

/// Which of the two voice envelopes scales an operator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeSource {
    #[default]
    Primary,
    Secondary,
}

impl EnvelopeSource {
    pub const ALL: [EnvelopeSource; NUM_ENVELOPES] =
        [EnvelopeSource::Primary, EnvelopeSource::Secondary];

    pub fn from_index(index: usize) -> Result<Self, ParamError> {
        match index {
            0 => Ok(EnvelopeSource::Primary),
            1 => Ok(EnvelopeSource::Secondary),
            i => Err(ParamError::EnvelopeSourceOutOfRange(i)),
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            EnvelopeSource::Primary => 0,
            EnvelopeSource::Secondary => 1,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatorParams {
    pub mode: OperatorMode,
    /// Frequency multiple of the note pitch (0.1 - 20)
    pub ratio: f32,
    /// Serial gain into the next operator (0.0 - 1.0)
    pub gain: f32,
    /// Parallel gain straight to the voice output (0.0 - 1.0)
    pub gain_out: f32,
    pub context1: f32,
    pub context2: f32,
    /// Low-pass cutoff shift per Hz of note pitch
    pub key_track: f32,
    pub envelope: EnvelopeSource,
}

impl Default for OperatorParams {
    fn default() -> Self {
        Self {
            mode: OperatorMode::Oscillator,
            ratio: 1.0,
            gain: 0.0,
            gain_out: 0.0,
            context1: 0.0,
            context2: 0.0,
            key_track: 0.5,
            envelope: EnvelopeSource::Primary,
        }
    }
}

/// Every user-facing control of one voice, copied in at a block boundary.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub envelopes: [EnvelopeParams; NUM_ENVELOPES],
    pub operators: [OperatorParams; NUM_OPERATORS],
    /// `matrix[i][j]`: how strongly operator `j` phase-modulates operator `i`
    pub matrix: [[f32; NUM_OPERATORS]; NUM_OPERATORS],
    pub lfos: [LfoParams; NUM_LFOS],
    /// Direct route of the LFO with the same index
    pub lfo_routes: [DirectLfoRoute; NUM_LFOS],
    pub slots: [ModSlot; NUM_MOD_SLOTS],
    pub mod_wheel: f32,
}

impl ParameterSnapshot {
    #[inline]
    pub fn envelope_for(&self, source: EnvelopeSource) -> &EnvelopeParams {
        &self.envelopes[source.index()]
    }

    /// Replace one slot after validating its host-side indices.
    pub fn set_slot(
        &mut self,
        slot: usize,
        source: usize,
        destination: usize,
        amount: f32,
    ) -> Result<(), ParamError> {
        let entry = ModSlot::from_indices(source, destination, amount)?;
        match self.slots.get_mut(slot) {
            Some(s) => {
                *s = entry;
                Ok(())
            }
            None => Err(ParamError::SlotOutOfRange(slot)),
        }
    }
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        let mut operators = [OperatorParams::default(); NUM_OPERATORS];
        operators[0].gain = 0.7;

        Self {
            envelopes: [EnvelopeParams::default(); NUM_ENVELOPES],
            operators,
            matrix: [[0.0; NUM_OPERATORS]; NUM_OPERATORS],
            lfos: [LfoParams::default(); NUM_LFOS],
            lfo_routes: [DirectLfoRoute::default(); NUM_LFOS],
            slots: [ModSlot::default(); NUM_MOD_SLOTS],
            mod_wheel: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::modulation::{Destination, ModSource};

    #[test]
    fn test_default_is_init_patch() {
        let snapshot = ParameterSnapshot::default();
        assert_eq!(snapshot.operators[0].gain, 0.7);
        assert!(snapshot.operators[1..].iter().all(|op| op.gain == 0.0));
        assert!(snapshot.operators.iter().all(|op| op.gain_out == 0.0));
        assert!(snapshot.slots.iter().all(|s| s.destination == Destination::None));
        assert!(snapshot.matrix.iter().flatten().all(|&w| w == 0.0));
        assert_eq!(snapshot.mod_wheel, 0.0);
    }

    #[test]
    fn test_set_slot_validates() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.set_slot(2, 2, 20, 0.5).unwrap();
        assert_eq!(snapshot.slots[2].source, ModSource::ModWheel);
        assert_eq!(snapshot.slots[2].destination, Destination::matrix_cell(0, 1).unwrap());

        assert_eq!(
            snapshot.set_slot(0, 0, 55, 1.0),
            Err(ParamError::DestinationOutOfRange(55))
        );
        assert_eq!(snapshot.set_slot(8, 0, 1, 1.0), Err(ParamError::SlotOutOfRange(8)));
        // Failed calls leave the table untouched
        assert_eq!(snapshot.slots[0], ModSlot::default());
    }

    #[test]
    fn test_envelope_source_index() {
        assert_eq!(EnvelopeSource::from_index(1).unwrap(), EnvelopeSource::Secondary);
        assert_eq!(
            EnvelopeSource::from_index(2),
            Err(ParamError::EnvelopeSourceOutOfRange(2))
        );
    }
}
