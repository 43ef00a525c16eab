//! Benchmarks for a single operator in each processing mode.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use matrix_fm::dsp::{
    operator::{Operator, OperatorInput},
    OperatorMode, ProcessSpec,
};

use crate::BLOCK_SIZES;

pub fn bench_operator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/operator");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp) for the filter modes
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();
        let mut output = vec![0.0f32; size];

        let modes = [
            ("oscillator", OperatorMode::Oscillator, 0.0, 0.0),
            ("lowpass", OperatorMode::LowPass, 0.3, 0.5),
            ("comb", OperatorMode::Comb, 0.9, 0.2),
            ("pass_through", OperatorMode::PassThrough, 0.0, 0.0),
        ];

        for (name, mode, context1, context2) in modes {
            let mut op = Operator::new();
            op.prepare(ProcessSpec::new(48_000.0, size));

            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    for (out, &x) in output.iter_mut().zip(input.iter()) {
                        *out = op.process(black_box(&OperatorInput {
                            input: x,
                            target_hz: 440.0,
                            phase_mod: 0.0,
                            context1,
                            context2,
                            key_track: 0.5,
                            note_hz: 440.0,
                            mode,
                        }));
                    }
                    black_box(&output);
                })
            });
        }
    }

    group.finish();
}
