#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{dsp::clamp_finite, MIN_TIME};

const ATTACK_EPSILON: f32 = 1e-6;

/*
ADSR Envelope Implementation
============================

Each FM voice owns two of these: a primary and a secondary envelope. Every
operator picks one of them to scale its serial and parallel outputs, and the
voice stays alive until both have fallen back to Idle.

Vocabulary
----------

  level       The envelope's current output value (0.0 to 1.0).

  stage       Which phase of the envelope we're in: Idle, Attack, Decay,
              Sustain, or Release.

  retrigger   Whether note_on drops the level to 0 before the attack. With
              retrigger off, a new note attacks from wherever the previous
              one left the level, which smooths legato playing.

  increment   How much `level` changes per sample. Calculated from the stage
              duration and sample rate.


The Shape: Linear Ramps
-----------------------

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        Attack Decay  Sustain  Release

    increment = target_change / (time_seconds * sample_rate)

Attack is clamped to exactly 1.0 on the sample it crosses, decay is clamped
to exactly the sustain level, and release interpolates from the level it
started at down to exactly 0.0.


The State Machine
-----------------

    Idle ──note_on──→ Attack ──level=1──→ Decay ──level=S──→ Sustain
      ↑                  │                  │                   │
      │                  └──────note_off────┴───────────────────┘
      │                                     ↓
      └──────────────level=0──────────── Release

note_off triggers Release from ANY non-idle stage, starting at the CURRENT
level. Releasing halfway up an attack therefore does not jump to the sustain
level first, which would click.
*/

/// Shape of one envelope, as carried in a parameter snapshot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    /// Seconds to ramp 0 → 1
    pub attack: f32,
    /// Seconds to ramp 1 → sustain
    pub decay: f32,
    /// Level held while the gate is high (0.0 - 1.0)
    pub sustain: f32,
    /// Seconds to ramp current → 0
    pub release: f32,
    /// Drop to zero on note-on instead of attacking from the current level
    pub retrigger: bool,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack: 0.1,
            decay: 0.5,
            sustain: 0.7,
            release: 1.0,
            retrigger: true,
        }
    }
}

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,    // Gate low, envelope inactive, level = 0
    Attack,  // Gate just went high, ramping up to 1.0
    Decay,   // Reached peak, ramping down to sustain level
    Sustain, // Holding at sustain level while gate is high
    Release, // Gate went low, ramping down to 0
}

#[derive(Debug, Clone)]
pub struct Envelope {
    // ADSR parameters (loaded on note-on)
    attack_time: f32,
    decay_time: f32,
    sustain_level: f32,
    release_time: f32,

    sample_rate: f32,

    // Runtime state (changes every sample)
    stage: EnvelopeState,
    level: f32,

    // Release bookkeeping (we pre-calculate at note_off for precision)
    release_start_level: f32,
    release_total_samples: u32,
    release_elapsed_samples: u32,
}

impl Envelope {
    pub fn new() -> Self {
        Self::with_params(&EnvelopeParams::default())
    }

    pub fn with_params(params: &EnvelopeParams) -> Self {
        let mut env = Self {
            attack_time: MIN_TIME,
            decay_time: MIN_TIME,
            sustain_level: 1.0,
            release_time: MIN_TIME,
            sample_rate: 44_100.0,

            stage: EnvelopeState::Idle,
            level: 0.0,
            release_start_level: 0.0,
            release_total_samples: 1,
            release_elapsed_samples: 0,
        };
        env.set_params(params);
        env
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Load a new shape. Takes effect from the next sample.
    pub fn set_params(&mut self, params: &EnvelopeParams) {
        self.attack_time = params.attack.max(MIN_TIME);
        self.decay_time = params.decay.max(MIN_TIME);
        self.sustain_level = clamp_finite(params.sustain, 0.0, 1.0);
        self.release_time = params.release.max(MIN_TIME);
    }

    /// Gate high: start the attack phase.
    ///
    /// With `retrigger` the level restarts from zero so repeated notes sound
    /// distinct. Without it the attack resumes from the current level.
    pub fn note_on(&mut self, retrigger: bool) {
        if retrigger {
            self.level = 0.0;
        }
        self.stage = EnvelopeState::Attack;
        self.release_elapsed_samples = 0;
    }

    /// Gate low: start the release phase from current level.
    pub fn note_off(&mut self) {
        if matches!(self.stage, EnvelopeState::Idle) {
            return;
        }

        // Snapshot current level - we'll interpolate from here to 0
        self.release_start_level = self.level;
        self.release_total_samples = (self.release_time * self.sample_rate).round().max(1.0) as u32;
        self.release_elapsed_samples = 0;
        self.stage = EnvelopeState::Release;
    }

    /// Advance the envelope by one sample and return the new level.
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeState::Idle => {
                self.level = 0.0;
            }

            EnvelopeState::Attack => {
                let increment = 1.0 / (self.attack_time * self.sample_rate);
                self.level += increment;

                // Accumulated f32 steps can land a hair under 1.0
                if self.level >= 1.0 - ATTACK_EPSILON {
                    self.level = 1.0;
                    self.stage = EnvelopeState::Decay;
                }
            }

            EnvelopeState::Decay => {
                // Ramp from 1.0 down to sustain_level
                let target = self.sustain_level;
                let decrement = (1.0 - target) / (self.decay_time * self.sample_rate);
                self.level -= decrement;

                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeState::Sustain;
                }
            }

            EnvelopeState::Sustain => {
                self.level = self.sustain_level;
            }

            EnvelopeState::Release => {
                // level = start * (1 - elapsed/total)
                self.release_elapsed_samples = self.release_elapsed_samples.saturating_add(1);
                let progress =
                    self.release_elapsed_samples as f32 / self.release_total_samples as f32;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);

                if self.release_elapsed_samples >= self.release_total_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    /// Render a block of envelope values into the buffer.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Returns true if the envelope is producing output (not idle).
    pub fn is_active(&self) -> bool {
        !matches!(self.stage, EnvelopeState::Idle)
    }

    /// Reset to idle state.
    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Idle;
        self.level = 0.0;
        self.release_elapsed_samples = 0;
        self.release_start_level = 0.0;
    }

    /// Get the current envelope level (0.0 to 1.0)
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Get the current envelope stage
    pub fn state(&self) -> EnvelopeState {
        self.stage
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
