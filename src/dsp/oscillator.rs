use std::f32::consts::{PI, TAU};

/*
Phase Accumulation
==================

Every periodic source in the engine (operator oscillators and LFOs) is built
from the same piece: a phase that advances by a fixed amount per sample and
wraps back into one period.

    increment = 2π · frequency / sample_rate

    phase:  0 ──────→ 2π ┐
            ┌────────────┘   (wrap)
            0 ──────→ 2π ┐
                          ...

The phase is kept in radians in [0, 2π). Wrapping uses the Euclidean
remainder rather than a single subtraction, so an increment larger than one
period (ratio 20 on a high note) still lands back inside the range.


Shapes From One Phase
---------------------

  sine      sin(φ)
  triangle  (2/π)·asin(sin(φ))     constant slope, peaks at ±1
  saw       φ/π − 1                 rises −1 → +1 across the period
  square    +1 for φ < π, −1 after
*/

/// Wrapped `[0, 2π)` phase accumulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Phasor {
    phase: f32,
}

impl Phasor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase in radians.
    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Move the phase forward by one sample at `frequency_hz`.
    #[inline]
    pub fn advance(&mut self, frequency_hz: f32, sample_rate: f32) {
        let increment = TAU * frequency_hz / sample_rate;
        self.phase += increment;
        if !(0.0..TAU).contains(&self.phase) {
            self.phase = self.phase.rem_euclid(TAU);
            // rem_euclid can round up to exactly TAU in f32
            if self.phase >= TAU || !self.phase.is_finite() {
                self.phase = 0.0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[inline]
pub fn sine(phase: f32) -> f32 {
    phase.sin()
}

#[inline]
pub fn triangle(phase: f32) -> f32 {
    (2.0 / PI) * phase.sin().asin()
}

#[inline]
pub fn saw(phase: f32) -> f32 {
    phase / PI - 1.0
}

#[inline]
pub fn square(phase: f32) -> f32 {
    if phase < PI {
        1.0
    } else {
        -1.0
    }
}
