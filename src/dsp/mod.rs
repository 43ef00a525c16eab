//! Low-level DSP primitives used by the FM voice.
//!
//! These components are allocation-free once prepared and realtime-safe,
//! making them safe to embed directly inside voice structs. They stay focused
//! on the signal-processing math; routing and modulation live in `synth`.

/// Fractional delay line backing the comb operator.
pub mod delay;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// Topology-preserving state-variable low-pass.
pub mod filter;
/// Low frequency oscillator with selectable waveform.
pub mod lfo;
/// Wrapped phase accumulator and waveform shapes.
pub mod oscillator;
/// Oscillator / low-pass / comb processing unit.
pub mod operator;

pub use envelope::EnvelopeState;
pub use operator::{Operator, OperatorMode};

/// Audio format passed to `prepare`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub block_size: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            block_size,
        }
    }
}

/// `clamp` that maps NaN to the bottom of the range (0 where the range
/// includes it) instead of passing it through.
#[inline]
pub fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min.max(0.0).min(max);
    }
    value.clamp(min, max)
}

/// Linear map of a normalized `0..=1` control onto `min..=max`.
#[inline]
pub(crate) fn lerp(t: f32, min: f32, max: f32) -> f32 {
    min + t * (max - min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_finite_maps_nan_into_range() {
        assert_eq!(clamp_finite(f32::NAN, 0.0, 1.0), 0.0);
        assert_eq!(clamp_finite(f32::NAN, -1.0, 1.0), 0.0);
        assert_eq!(clamp_finite(f32::NAN, 0.1, 20.0), 0.1);
        assert_eq!(clamp_finite(f32::INFINITY, 0.0, 1.0), 1.0);
        assert_eq!(clamp_finite(0.4, 0.0, 1.0), 0.4);
    }
}
