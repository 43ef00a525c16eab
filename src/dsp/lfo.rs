//! Low Frequency Oscillator (LFO) generator.

/*
Low Frequency Oscillators
=========================

An LFO is an oscillator running at sub-audio frequencies (0.1 - 30 Hz here).
Its output does not reach the speakers; the modulation router adds it to
operator gains, ratios, context knobs and matrix cells.

Output is bipolar: waveform (-1.0 to +1.0) times `amount`.

Sync and Phase
--------------

FREE-RUNNING (sync off): the phase carries on across notes. Two voices
    with identical LFO settings drift apart, since each voice owns its own
    phase, and every note catches the sweep at a different point.

SYNCED (sync on): note_on resets the phase to 0, so every note gets the
    same modulation shape from the start.

Each voice owns its LFO phases. Nothing is shared between voices, so the
audio thread needs no locking to advance them.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::oscillator::{self, Phasor},
    error::ParamError,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoWaveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
}

impl LfoWaveform {
    pub const ALL: [LfoWaveform; 4] = [
        LfoWaveform::Sine,
        LfoWaveform::Triangle,
        LfoWaveform::Saw,
        LfoWaveform::Square,
    ];

    /// Waveform for a host-side selector value (0 = sine ... 3 = square).
    pub fn from_index(index: usize) -> Result<Self, ParamError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ParamError::WaveformOutOfRange(index))
    }

    #[inline]
    pub fn evaluate(self, phase: f32) -> f32 {
        match self {
            LfoWaveform::Sine => oscillator::sine(phase),
            LfoWaveform::Triangle => oscillator::triangle(phase),
            LfoWaveform::Saw => oscillator::saw(phase),
            LfoWaveform::Square => oscillator::square(phase),
        }
    }
}

/// Settings for one LFO, as carried in a parameter snapshot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoParams {
    /// Rate in Hz
    pub frequency: f32,
    /// Output scale applied to the waveform (0.0 - 1.0)
    pub amount: f32,
    pub waveform: LfoWaveform,
    /// Reset phase on note-on
    pub sync: bool,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            amount: 0.0,
            waveform: LfoWaveform::Sine,
            sync: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lfo {
    phasor: Phasor,
    sample_rate: f32,
}

impl Lfo {
    pub fn new() -> Self {
        Self {
            phasor: Phasor::new(),
            sample_rate: 44_100.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Called on every note-on. Only a synced LFO restarts its phase.
    pub fn note_on(&mut self, sync: bool) {
        if sync {
            self.phasor.reset();
        }
    }

    /// Scaled output at the current phase, then advance one sample.
    #[inline]
    pub fn next_value(&mut self, params: &LfoParams) -> f32 {
        let value = params.waveform.evaluate(self.phasor.phase()) * params.amount;
        self.phasor.advance(params.frequency, self.sample_rate);
        value
    }

    pub fn phase(&self) -> f32 {
        self.phasor.phase()
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}
