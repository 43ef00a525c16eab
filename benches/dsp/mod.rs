//! Benchmarks for low-level DSP primitives.

mod envelope;
mod lfo;
mod operator;

pub use envelope::bench_envelope;
pub use lfo::bench_lfo;
pub use operator::bench_operator;
