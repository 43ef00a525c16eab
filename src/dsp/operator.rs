use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;

use crate::dsp::{
    delay::DelayLine,
    filter::{SVFilter, MAX_CUTOFF_HZ, MAX_RESONANCE, MIN_CUTOFF_HZ, MIN_RESONANCE},
    lerp,
    oscillator::Phasor,
    ProcessSpec,
};

/*
FM Operator
===========

One of the six processing units in a voice. Every operator has the same call
shape: it receives the serial chain value as `input`, a phase-modulation sum
from the feedback matrix, two normalized context knobs and the note pitch,
and returns one sample. What it does with them depends on its mode:

  mode         context1               context2            output
  ----------   --------------------   -----------------   ----------------------
  Oscillator   phase offset (turns)   unused              sin(φ + pm + c1·2π) + input
  LowPass      cutoff 20 Hz - 20 kHz  resonance 0.1 - 10  SVF low-pass of input
  Comb         feedback 0 - 0.98      pitch 20 - 10 kHz   input + delayed
  PassThrough  unused                 unused              input

The oscillator adds its serial input instead of replacing it, so a chain of
oscillators stacks carriers and a filter further down the chain sees all of
them.

Key tracking shifts the low-pass cutoff with the note:

    cutoff += (note_hz - KEY_TRACK_REFERENCE_HZ) · key_track

Comb feedback is capped at 0.98. At 1.0 the loop never decays; anything below
keeps the recirculating energy bounded by input / (1 - feedback).

All three states (phase, integrators, delay buffer) persist together, so a
mode switch mid-note does not lose the other modes' history.
*/

/// Note pitch at which key tracking leaves the cutoff unchanged (middle C).
pub const KEY_TRACK_REFERENCE_HZ: f32 = 261.63;
/// Seconds of audio the comb buffer can hold (covers the 20 Hz floor with headroom).
pub const MAX_COMB_SECONDS: f32 = 0.2;
pub const MAX_COMB_FEEDBACK: f32 = 0.98;
pub const MIN_COMB_HZ: f32 = 20.0;
pub const MAX_COMB_HZ: f32 = 18_000.0;
/// Top of the `context2` comb pitch knob.
const COMB_KNOB_MAX_HZ: f32 = 10_000.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorMode {
    #[default]
    Oscillator,
    LowPass,
    Comb,
    /// Output equals input. Any unknown mode index lands here.
    PassThrough,
}

impl OperatorMode {
    /// Mode for a host-side selector value. Out-of-range values degrade to
    /// pass-through rather than failing.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => OperatorMode::Oscillator,
            1 => OperatorMode::LowPass,
            2 => OperatorMode::Comb,
            _ => OperatorMode::PassThrough,
        }
    }
}

/// Per-sample controls for [`Operator::process`], already modulated and
/// clamped by the voice.
#[derive(Debug, Clone, Copy)]
pub struct OperatorInput {
    /// Serial chain value from the previous operator
    pub input: f32,
    /// Oscillator frequency (note pitch × ratio)
    pub target_hz: f32,
    /// Phase modulation from the feedback matrix, radians
    pub phase_mod: f32,
    pub context1: f32,
    pub context2: f32,
    pub key_track: f32,
    pub note_hz: f32,
    pub mode: OperatorMode,
}

#[derive(Debug, Clone)]
pub struct Operator {
    sample_rate: f32,
    phasor: Phasor,
    filter: SVFilter,
    delay: DelayLine,
}

impl Operator {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100.0,
            phasor: Phasor::new(),
            filter: SVFilter::new(),
            delay: DelayLine::new(),
        }
    }

    /// Size internal buffers for `spec` and clear all state.
    ///
    /// Safe to call repeatedly; the delay buffer is only reallocated when
    /// the sample rate changes its required length.
    pub fn prepare(&mut self, spec: ProcessSpec) {
        self.sample_rate = spec.sample_rate.max(1.0);
        let capacity = (self.sample_rate * MAX_COMB_SECONDS).ceil() as usize;
        self.delay.allocate(capacity);
        debug!(
            "operator prepared: {} Hz, comb capacity {} samples",
            self.sample_rate, capacity
        );
        self.reset();
    }

    /// Zero phase, filter and delay state. Called on every note-on.
    pub fn reset(&mut self) {
        self.phasor.reset();
        self.filter.reset();
        self.delay.reset();
    }

    /// Produce one output sample.
    #[inline]
    pub fn process(&mut self, io: &OperatorInput) -> f32 {
        match io.mode {
            OperatorMode::Oscillator => self.oscillator(io),
            OperatorMode::LowPass => self.lowpass(io),
            OperatorMode::Comb => self.comb(io),
            OperatorMode::PassThrough => io.input,
        }
    }

    #[inline]
    fn oscillator(&mut self, io: &OperatorInput) -> f32 {
        let offset = io.context1 * TAU;
        let out = (self.phasor.phase() + io.phase_mod + offset).sin();
        self.phasor.advance(io.target_hz, self.sample_rate);
        out + io.input
    }

    #[inline]
    fn lowpass(&mut self, io: &OperatorInput) -> f32 {
        let tracking = (io.note_hz - KEY_TRACK_REFERENCE_HZ) * io.key_track;
        let cutoff = (lerp(io.context1, MIN_CUTOFF_HZ, MAX_CUTOFF_HZ) + tracking)
            .clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        let resonance = (io.context2 * 9.9 + 0.1).clamp(MIN_RESONANCE, MAX_RESONANCE);
        self.filter.lowpass(io.input, cutoff, resonance, self.sample_rate)
    }

    #[inline]
    fn comb(&mut self, io: &OperatorInput) -> f32 {
        if !self.delay.is_allocated() {
            return io.input;
        }
        let feedback = io.context1.clamp(0.0, MAX_COMB_FEEDBACK);
        let delay_hz =
            lerp(io.context2, MIN_COMB_HZ, COMB_KNOB_MAX_HZ).clamp(MIN_COMB_HZ, MAX_COMB_HZ);
        let delay_samples = self.sample_rate / delay_hz;

        let delayed = self.delay.read(delay_samples);
        self.delay.write(io.input + delayed * feedback);
        io.input + delayed
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::new()
    }
}
