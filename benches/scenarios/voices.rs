//! Benchmarks for complete FM voices.
//!
//! From the init patch (one operator sounding) up to all six operators with
//! a dense matrix and every modulation slot in use.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use matrix_fm::{
    dsp::OperatorMode,
    synth::{Destination, FmVoice, ModSlot, ModSource, ParameterSnapshot},
    NUM_OPERATORS,
};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: f64 = 48_000.0;

fn playing_voice(patch: &ParameterSnapshot, size: usize) -> FmVoice {
    let mut voice = FmVoice::new();
    voice.prepare(SAMPLE_RATE, size);
    voice.set_current_params(patch);
    voice.start_note(57, 1.0, 0);
    voice
}

/// Every operator sounding, every cell of the matrix non-zero.
fn full_matrix() -> ParameterSnapshot {
    let mut patch = ParameterSnapshot::default();
    for (i, op) in patch.operators.iter_mut().enumerate() {
        op.ratio = 1.0 + i as f32 * 0.5;
        op.gain = 0.5;
        op.gain_out = 0.2;
    }
    for (i, row) in patch.matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = 0.1 * ((i + j) % 3) as f32 + 0.05;
        }
    }
    patch
}

/// Oscillators into comb and low-pass, all eight slots routed.
fn modulated_chain() -> ParameterSnapshot {
    let mut patch = full_matrix();
    patch.operators[3].mode = OperatorMode::Comb;
    patch.operators[3].context1 = 0.8;
    patch.operators[3].context2 = 0.3;
    patch.operators[5].mode = OperatorMode::LowPass;
    patch.operators[5].context1 = 0.4;
    patch.operators[5].context2 = 0.6;

    patch.lfos[0].amount = 0.5;
    patch.lfos[1].amount = 0.3;
    patch.lfos[1].frequency = 6.0;

    let sources = [ModSource::Lfo1, ModSource::Lfo2, ModSource::ModWheel];
    for (k, slot) in patch.slots.iter_mut().enumerate() {
        let op = k % NUM_OPERATORS;
        let destination = match k % 3 {
            0 => Destination::op_ratio(op),
            1 => Destination::op_context1(op),
            _ => Destination::matrix_cell(op, (op + 1) % NUM_OPERATORS),
        };
        if let Ok(destination) = destination {
            *slot = ModSlot {
                source: sources[k % sources.len()],
                destination,
                amount: 0.2,
            };
        }
    }
    patch.mod_wheel = 0.5;
    patch
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    let patches = [
        ("init", ParameterSnapshot::default()),
        ("full_matrix", full_matrix()),
        ("modulated_chain", modulated_chain()),
    ];

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for (name, patch) in &patches {
            let mut voice = playing_voice(patch, size);
            group.bench_with_input(BenchmarkId::new(*name, size), &size, |b, _| {
                b.iter(|| {
                    buffer.fill(0.0);
                    let mut channels = [buffer.as_mut_slice()];
                    voice.render_next_block(black_box(&mut channels), 0, size);
                })
            });
        }

        // === FULL POOL ===
        // Eight voices on the heaviest patch, as the demo binary plays them
        let patch = modulated_chain();
        let mut pool: Vec<FmVoice> = (0..8).map(|_| playing_voice(&patch, size)).collect();
        group.bench_with_input(BenchmarkId::new("pool_8", size), &size, |b, _| {
            b.iter(|| {
                buffer.fill(0.0);
                let mut channels = [buffer.as_mut_slice()];
                for voice in pool.iter_mut() {
                    voice.render_next_block(black_box(&mut channels), 0, size);
                }
            })
        });
    }

    group.finish();
}
