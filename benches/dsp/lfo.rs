//! Benchmarks for LFO waveform evaluation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use matrix_fm::dsp::lfo::{Lfo, LfoParams, LfoWaveform};

use crate::BLOCK_SIZES;

pub fn bench_lfo(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/lfo");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for waveform in LfoWaveform::ALL {
            let params = LfoParams {
                frequency: 5.0,
                amount: 1.0,
                waveform,
                sync: true,
            };
            let mut lfo = Lfo::new();
            lfo.set_sample_rate(48_000.0);

            let name = format!("{:?}", waveform).to_lowercase();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    for sample in buffer.iter_mut() {
                        *sample = lfo.next_value(black_box(&params));
                    }
                    black_box(&buffer);
                })
            });
        }
    }

    group.finish();
}
