//! Real-world scenario benchmarks.
//!
//! These benchmarks render complete FM voices with realistic patches,
//! alone and as a full pool.

mod voices;

pub use voices::bench_voices;
