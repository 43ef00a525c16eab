use std::f32::consts::PI;

/*
State-Variable Low-Pass
=======================

Two trapezoidal integrators in a loop (the "TPT" or zero-delay-feedback
form). Unlike a direct-form biquad this stays stable while the cutoff moves
every sample, which is exactly what the low-pass operator does under LFO
and key-tracking modulation.

    g = tan(π · cutoff / sample_rate)      prewarped integrator gain
    k = 1 / resonance                      damping

    h  = 1 / (1 + g·(g + k))
    v3 = x - ic2
    v1 = h·(ic1 + g·v3)                    band-pass
    v2 = ic2 + g·v1                        low-pass
    ic1 = 2·v1 - ic1
    ic2 = 2·v2 - ic2

Resonance here is Q: 0.707 is flat, 10 is a sharp peak at the cutoff. Any
k > 0 keeps the loop stable, so the 0.1 floor on resonance is only about
the peak level, never about blowing up.
*/

/// Lowest cutoff the filter accepts.
pub const MIN_CUTOFF_HZ: f32 = 20.0;
/// Highest cutoff the filter accepts (also held below Nyquist).
pub const MAX_CUTOFF_HZ: f32 = 20_000.0;
pub const MIN_RESONANCE: f32 = 0.1;
pub const MAX_RESONANCE: f32 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory
}

impl SVFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prewarped integrator gain for `cutoff_hz`, clamped to the legal range.
    #[inline]
    pub fn compute_g(cutoff_hz: f32, sample_rate: f32) -> f32 {
        let nyquist_guard = sample_rate * 0.49;
        let cutoff = cutoff_hz
            .clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ)
            .min(nyquist_guard);
        (PI * cutoff / sample_rate).tan()
    }

    /// Run one sample through the low-pass response.
    #[inline]
    pub fn lowpass(
        &mut self,
        sample: f32,
        cutoff_hz: f32,
        resonance: f32,
        sample_rate: f32,
    ) -> f32 {
        let g = Self::compute_g(cutoff_hz, sample_rate);
        let k = 1.0 / resonance.clamp(MIN_RESONANCE, MAX_RESONANCE);
        self.next_sample(sample, k, g)
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> f32 {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v2
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
