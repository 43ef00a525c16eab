use log::trace;

use crate::{
    dsp::{
        clamp_finite,
        envelope::Envelope,
        lfo::Lfo,
        operator::{Operator, OperatorInput},
        ProcessSpec,
    },
    synth::{
        modulation::{
            Destination, ModOffsets, ModSources, OpIndex, CONTEXT_RANGE, GAIN_RANGE,
            KEY_TRACK_RANGE,
        },
        params::{EnvelopeSource, ParameterSnapshot},
    },
    NUM_ENVELOPES, NUM_LFOS, NUM_OPERATORS,
};

/*
FM Voice
========

Six operators, two envelopes and two LFOs playing one note.

Per sample:

    lfo[0..2]      advance, scaled by amount
    offsets        rebuilt from slots + direct routes
    env[0..2]      advance

    chain = 0, parallel = 0
    for i in 0..6:
        pm    = Σ_j  out[j] · matrix'[i][j]
        out[i] = op[i](input = chain, pm, ratio', c1', ...)
        parallel += out[i] · gain_out · env[src(i)]
        chain     = out[i] · gain'    · env[src(i)]

    sample = (parallel + chain) · HEADROOM

Primes mark modulated values. `out[]` lives across samples: when operator i
reads out[j], sources j < i already hold this sample's value and j ≥ i
(itself included) still hold the previous sample's. That one-sample delay is
what makes feedback paths like 3 → 1 or 2 → 2 well defined.

An operator with both gains at (or under) the bypass threshold is skipped:
the chain passes through it untouched, its out[] slot reads 0 and its
phase does not advance.


Lifecycle
---------

    Idle ──start_note──→ Active ──stop_note(tail)──→ Releasing
      ↑                    │                            │
      └───stop_note(hard)──┴──both envelopes idle───────┘

The voice never allocates after `prepare`.
*/

/// Mix scale applied to the summed operator outputs.
pub const HEADROOM: f32 = 0.2;
/// Gains at or below this are treated as off.
pub const BYPASS_THRESHOLD: f32 = 0.0001;

const MOD_WHEEL_CC: u8 = 1;

/// Identifies what kind of sound a voice can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundTag(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,      // Available for a new note
    Active,    // Gate high
    Releasing, // Gate low, envelopes still ringing
}

#[derive(Debug, Clone)]
pub struct FmVoice {
    sample_rate: f32,
    prepared: bool,
    state: VoiceState,

    operators: [Operator; NUM_OPERATORS],
    envelopes: [Envelope; NUM_ENVELOPES],
    lfos: [Lfo; NUM_LFOS],

    params: ParameterSnapshot,
    offsets: ModOffsets,
    op_outputs: [f32; NUM_OPERATORS],

    note: u8,
    note_hz: f32,
    velocity: f32,
    start_offset: usize,
    mod_wheel: f32,
}

impl FmVoice {
    pub const SOUND: SoundTag = SoundTag("matrix-fm");

    pub fn new() -> Self {
        let params = ParameterSnapshot::default();
        Self {
            sample_rate: 44_100.0,
            prepared: false,
            state: VoiceState::Idle,
            operators: std::array::from_fn(|_| Operator::new()),
            envelopes: std::array::from_fn(|i| Envelope::with_params(&params.envelopes[i])),
            lfos: std::array::from_fn(|_| Lfo::new()),
            mod_wheel: params.mod_wheel,
            params,
            offsets: ModOffsets::new(),
            op_outputs: [0.0; NUM_OPERATORS],
            note: 0,
            note_hz: 0.0,
            velocity: 0.0,
            start_offset: 0,
        }
    }

    /// Size buffers for the audio format. Must run before the first note.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        let spec = ProcessSpec::new(sample_rate, block_size);
        self.sample_rate = spec.sample_rate;

        for op in &mut self.operators {
            op.prepare(spec);
        }
        for env in &mut self.envelopes {
            env.set_sample_rate(spec.sample_rate);
        }
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(spec.sample_rate);
        }

        self.prepared = true;
    }

    pub fn can_play(&self, sound: &SoundTag) -> bool {
        *sound == Self::SOUND
    }

    /// Replace the snapshot used from the next sample on.
    pub fn set_current_params(&mut self, snapshot: &ParameterSnapshot) {
        // Only a moved wheel overrides a controller message received in between
        if snapshot.mod_wheel != self.params.mod_wheel {
            self.mod_wheel = clamp_finite(snapshot.mod_wheel, 0.0, 1.0);
        }
        self.params = *snapshot;
    }

    pub fn start_note(&mut self, note: u8, velocity: f32, start_offset: usize) {
        debug_assert!(self.prepared, "start_note called before prepare");
        trace!("voice start: note {} velocity {:.2}", note, velocity);

        self.note = note;
        self.note_hz = midi_to_hz(note);
        self.velocity = velocity;
        self.start_offset = start_offset;

        for (env, source) in self.envelopes.iter_mut().zip(EnvelopeSource::ALL) {
            let params = self.params.envelope_for(source);
            env.set_params(params);
            env.note_on(params.retrigger);
        }
        for (lfo, params) in self.lfos.iter_mut().zip(self.params.lfos.iter()) {
            lfo.note_on(params.sync);
        }
        for op in &mut self.operators {
            op.reset();
        }
        self.op_outputs = [0.0; NUM_OPERATORS];

        self.state = VoiceState::Active;
    }

    /// Gate low. Without tail-off the voice goes silent immediately.
    pub fn stop_note(&mut self, allow_tail_off: bool) {
        if self.state == VoiceState::Idle {
            return;
        }
        trace!("voice stop: note {} tail-off {}", self.note, allow_tail_off);

        for env in &mut self.envelopes {
            env.note_off();
        }

        if allow_tail_off {
            self.state = VoiceState::Releasing;
        } else {
            self.clear_note();
        }
    }

    pub fn controller_moved(&mut self, controller: u8, value: u8) {
        if controller == MOD_WHEEL_CC {
            self.mod_wheel = value.min(127) as f32 / 127.0;
        }
    }

    /// Add `num` samples into every channel, starting at `start`.
    pub fn render_next_block(&mut self, channels: &mut [&mut [f32]], start: usize, num: usize) {
        if !self.is_active() {
            return;
        }
        debug_assert!(self.prepared, "render_next_block called before prepare");
        if !self.prepared {
            return;
        }

        for n in start..start + num {
            let sample = self.next_sample();
            for channel in channels.iter_mut() {
                if let Some(out) = channel.get_mut(n) {
                    *out += sample;
                }
            }

            if !self.envelopes.iter().any(Envelope::is_active) {
                self.clear_note();
                break;
            }
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        let mut sources = ModSources {
            lfo: [0.0; NUM_LFOS],
            mod_wheel: self.mod_wheel,
        };
        for ((value, lfo), params) in sources
            .lfo
            .iter_mut()
            .zip(self.lfos.iter_mut())
            .zip(self.params.lfos.iter())
        {
            *value = lfo.next_value(params);
        }

        self.offsets
            .resolve(&self.params.slots, &self.params.lfo_routes, &sources);

        let mut env = [0.0; NUM_ENVELOPES];
        for (level, envelope) in env.iter_mut().zip(self.envelopes.iter_mut()) {
            *level = envelope.next_sample();
        }

        let mut chain = 0.0;
        let mut parallel = 0.0;

        for op in OpIndex::ALL {
            let i = op.get();
            let p = &self.params.operators[i];

            let gain = self.offsets.apply(Destination::OpGain(op), p.gain);
            let gain_out = clamp_finite(p.gain_out, GAIN_RANGE.0, GAIN_RANGE.1);
            if gain <= BYPASS_THRESHOLD && gain_out <= BYPASS_THRESHOLD {
                self.op_outputs[i] = 0.0;
                continue;
            }

            let mut phase_mod = 0.0;
            for source in OpIndex::ALL {
                let cell = Destination::MatrixCell { target: op, source };
                let weight = self.offsets.apply(cell, self.params.matrix[i][source.get()]);
                phase_mod += self.op_outputs[source.get()] * weight;
            }

            let ratio = self.offsets.apply(Destination::OpRatio(op), p.ratio);
            let context1 = self.offsets.apply(Destination::OpContext1(op), p.context1);
            let level = env[p.envelope.index()];

            let out = self.operators[i].process(&OperatorInput {
                input: chain,
                target_hz: self.note_hz * ratio,
                phase_mod,
                context1,
                context2: clamp_finite(p.context2, CONTEXT_RANGE.0, CONTEXT_RANGE.1),
                key_track: clamp_finite(p.key_track, KEY_TRACK_RANGE.0, KEY_TRACK_RANGE.1),
                note_hz: self.note_hz,
                mode: p.mode,
            });
            self.op_outputs[i] = out;

            parallel += out * gain_out * level;
            chain = out * gain * level;
        }

        (parallel + chain) * HEADROOM
    }

    fn clear_note(&mut self) {
        for env in &mut self.envelopes {
            env.reset();
        }
        self.state = VoiceState::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Active | VoiceState::Releasing)
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn note_hz(&self) -> f32 {
        self.note_hz
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn mod_wheel(&self) -> f32 {
        self.mod_wheel
    }

    /// Level of the primary or secondary envelope.
    pub fn envelope_level(&self, index: usize) -> Option<f32> {
        self.envelopes.get(index).map(Envelope::level)
    }

    /// Raw output of each operator on the most recent sample.
    pub fn op_outputs(&self) -> &[f32; NUM_OPERATORS] {
        &self.op_outputs
    }
}

impl Default for FmVoice {
    fn default() -> Self {
        Self::new()
    }
}

/// Equal-tempered pitch, A4 (69) = 440 Hz.
#[inline]
pub fn midi_to_hz(note: u8) -> f32 {
    440.0 * 2.0f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dsp::OperatorMode,
        synth::modulation::{ModSlot, ModSource},
    };

    const SAMPLE_RATE: f64 = 48_000.0;

    fn voice_with(snapshot: &ParameterSnapshot) -> FmVoice {
        let mut voice = FmVoice::new();
        voice.prepare(SAMPLE_RATE, 256);
        voice.set_current_params(snapshot);
        voice
    }

    fn render(voice: &mut FmVoice, len: usize) -> Vec<f32> {
        let mut buf = vec![0.0; len];
        {
            let mut channels = [buf.as_mut_slice()];
            voice.render_next_block(&mut channels, 0, len);
        }
        buf
    }

    #[test]
    fn test_midi_to_hz() {
        assert!((midi_to_hz(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_hz(57) - 220.0).abs() < 1e-3);
        assert!((midi_to_hz(60) - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_only_plays_own_sound() {
        let voice = FmVoice::new();
        assert!(voice.can_play(&FmVoice::SOUND));
        assert!(!voice.can_play(&SoundTag("sampler")));
    }

    #[test]
    fn test_lifecycle() {
        let mut voice = voice_with(&ParameterSnapshot::default());
        assert_eq!(voice.state(), VoiceState::Idle);

        voice.start_note(60, 0.8, 17);
        assert_eq!(voice.state(), VoiceState::Active);
        assert_eq!(voice.note(), 60);
        assert_eq!(voice.velocity(), 0.8);
        assert_eq!(voice.start_offset(), 17);

        voice.stop_note(true);
        assert_eq!(voice.state(), VoiceState::Releasing);
        assert!(voice.is_active());

        voice.stop_note(false);
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(!voice.is_active());
    }

    #[test]
    fn test_idle_voice_adds_nothing() {
        let mut voice = voice_with(&ParameterSnapshot::default());
        let mut buf = vec![0.5; 64];
        {
            let mut channels = [buf.as_mut_slice()];
            voice.render_next_block(&mut channels, 0, 64);
        }
        assert!(buf.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_render_is_additive_and_windowed() {
        let mut voice = voice_with(&ParameterSnapshot::default());
        voice.start_note(69, 1.0, 0);

        let mut left = vec![1.0; 128];
        let mut right = vec![1.0; 128];
        {
            let mut channels = [left.as_mut_slice(), right.as_mut_slice()];
            voice.render_next_block(&mut channels, 32, 64);
        }

        assert!(left[..32].iter().all(|&s| s == 1.0));
        assert!(left[96..].iter().all(|&s| s == 1.0));
        assert!(left[33..96].iter().any(|&s| s != 1.0));
        assert_eq!(left, right);
    }

    #[test]
    fn test_hard_stop_silences_immediately() {
        let mut voice = voice_with(&ParameterSnapshot::default());
        voice.start_note(69, 1.0, 0);
        render(&mut voice, 256);
        voice.stop_note(false);

        assert!(render(&mut voice, 256).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_release_tail_returns_voice_to_idle() {
        let mut snapshot = ParameterSnapshot::default();
        for env in &mut snapshot.envelopes {
            env.attack = 0.001;
            env.decay = 0.001;
            env.release = 0.01;
        }
        let mut voice = voice_with(&snapshot);
        voice.start_note(69, 1.0, 0);
        render(&mut voice, 480);

        voice.stop_note(true);
        render(&mut voice, 1_024);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_bypassed_operator_passes_chain_through() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.envelopes[0].attack = 0.0;
        snapshot.envelopes[0].sustain = 1.0;
        // Op 1 has zero gains: op 0's chain value must reach op 2 unchanged
        snapshot.operators[0].gain = 1.0;
        snapshot.operators[2].mode = OperatorMode::PassThrough;
        snapshot.operators[2].gain = 1.0;

        let mut direct = snapshot;
        direct.operators[1] = direct.operators[2];
        direct.operators[2].gain = 0.0;

        let mut a = voice_with(&snapshot);
        let mut b = voice_with(&direct);
        a.start_note(69, 1.0, 0);
        b.start_note(69, 1.0, 0);

        let out_a = render(&mut a, 512);
        let out_b = render(&mut b, 512);
        for (x, y) in out_a.iter().zip(out_b.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
        assert_eq!(a.op_outputs()[1], 0.0);
    }

    #[test]
    fn test_matrix_reads_previous_sample_for_later_operators() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.operators[0].gain = 0.0;
        snapshot.operators[0].gain_out = 1.0;
        snapshot.operators[1].gain = 0.0;
        snapshot.operators[1].gain_out = 1.0;
        snapshot.operators[1].ratio = 2.0;
        snapshot.matrix[0][1] = 1.0;

        let mut voice = voice_with(&snapshot);
        voice.start_note(69, 1.0, 0);

        let mut reference = Operator::new();
        reference.prepare(ProcessSpec::new(SAMPLE_RATE, 256));

        let mut previous_op1 = 0.0;
        for _ in 0..256 {
            render(&mut voice, 1);
            let expected = reference.process(&OperatorInput {
                input: 0.0,
                target_hz: 440.0,
                phase_mod: previous_op1,
                context1: 0.0,
                context2: 0.0,
                key_track: 0.5,
                note_hz: 440.0,
                mode: OperatorMode::Oscillator,
            });
            assert!((voice.op_outputs()[0] - expected).abs() < 1e-4);
            previous_op1 = voice.op_outputs()[1];
        }
    }

    #[test]
    fn test_mod_wheel_last_writer_wins() {
        let mut snapshot = ParameterSnapshot::default();
        let mut voice = voice_with(&snapshot);

        voice.controller_moved(1, 127);
        assert_eq!(voice.mod_wheel(), 1.0);

        // Unchanged wheel in the snapshot keeps the controller value
        snapshot.operators[0].ratio = 2.0;
        voice.set_current_params(&snapshot);
        assert_eq!(voice.mod_wheel(), 1.0);

        snapshot.mod_wheel = 0.25;
        voice.set_current_params(&snapshot);
        assert_eq!(voice.mod_wheel(), 0.25);

        voice.controller_moved(7, 0);
        assert_eq!(voice.mod_wheel(), 0.25);
    }

    #[test]
    fn test_mod_wheel_slot_moves_gain() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.operators[0].gain = 0.0;
        snapshot.slots[0] = ModSlot {
            source: ModSource::ModWheel,
            destination: Destination::op_gain(0).unwrap(),
            amount: 1.0,
        };
        let mut voice = voice_with(&snapshot);
        voice.start_note(69, 1.0, 0);

        assert!(render(&mut voice, 256).iter().all(|&s| s == 0.0));

        voice.controller_moved(1, 127);
        assert!(render(&mut voice, 256).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_note_on_resets_operator_history() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.matrix[0][0] = 0.5;
        let mut voice = voice_with(&snapshot);

        voice.start_note(69, 1.0, 0);
        let first = render(&mut voice, 128);
        voice.start_note(69, 1.0, 0);
        let second = render(&mut voice, 128);

        assert_eq!(first, second);
    }

    #[test]
    fn test_operator_follows_its_envelope() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.envelopes[0].attack = 0.0;
        snapshot.envelopes[0].sustain = 1.0;
        // Secondary is a 1 ms blip that decays to silence
        snapshot.envelopes[1].attack = 0.001;
        snapshot.envelopes[1].decay = 0.001;
        snapshot.envelopes[1].sustain = 0.0;

        let mut primary = voice_with(&snapshot);
        snapshot.operators[0].envelope = EnvelopeSource::Secondary;
        let mut secondary = voice_with(&snapshot);
        primary.start_note(69, 1.0, 0);
        secondary.start_note(69, 1.0, 0);
        render(&mut primary, 480);
        render(&mut secondary, 480);

        assert_eq!(secondary.envelope_level(0), Some(1.0));
        assert_eq!(secondary.envelope_level(1), Some(0.0));
        assert!(render(&mut secondary, 256).iter().all(|&s| s == 0.0));
        assert!(render(&mut primary, 256).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_nan_params_render_finite() {
        let mut snapshot = ParameterSnapshot::default();
        snapshot.envelopes[0].sustain = f32::NAN;
        snapshot.envelopes[0].attack = f32::NAN;
        snapshot.operators[0].gain_out = f32::NAN;
        snapshot.operators[1].mode = OperatorMode::LowPass;
        snapshot.operators[1].gain = 1.0;
        snapshot.operators[1].context2 = f32::NAN;
        snapshot.operators[1].key_track = f32::NAN;
        snapshot.operators[2].mode = OperatorMode::Comb;
        snapshot.operators[2].gain_out = 1.0;
        snapshot.operators[2].context2 = f32::NAN;
        snapshot.mod_wheel = f32::NAN;

        let mut voice = voice_with(&snapshot);
        voice.start_note(69, 1.0, 0);
        let out = render(&mut voice, 4_096);

        assert!(out.iter().all(|s| s.is_finite()));
        assert!(out.iter().any(|&s| s != 0.0));
        assert_eq!(voice.mod_wheel(), 0.0);
    }
}
