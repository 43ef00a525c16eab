//! Benchmarks for ADSR envelope generator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use matrix_fm::dsp::envelope::{Envelope, EnvelopeParams};

use crate::BLOCK_SIZES;

fn adsr(attack: f32, decay: f32, sustain: f32, release: f32) -> Envelope {
    let mut env = Envelope::with_params(&EnvelopeParams {
        attack,
        decay,
        sustain,
        release,
        retrigger: true,
    });
    env.set_sample_rate(48_000.0);
    env
}

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Attack phase (ramping up)
        let mut env = adsr(10.0, 0.1, 0.7, 0.3);
        env.note_on(true);
        group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer));
            })
        });

        // Sustain phase (holding steady)
        let mut env = adsr(0.001, 0.001, 0.7, 0.3);
        env.note_on(true);
        // Advance past attack/decay
        for _ in 0..200 {
            env.next_sample();
        }
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer));
            })
        });

        // Release phase (ramping down)
        let mut env = adsr(0.001, 0.001, 0.7, 10.0);
        env.note_on(true);
        for _ in 0..200 {
            env.next_sample();
        }
        env.note_off();
        group.bench_with_input(BenchmarkId::new("release", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
