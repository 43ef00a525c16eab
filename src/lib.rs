pub mod dsp; // Operators, envelopes, LFOs and their building blocks
pub mod error; // Configuration-time validation errors
pub mod synth; // Voice, modulation routing and parameter snapshots

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;

/// Operators per voice.
pub const NUM_OPERATORS: usize = 6;
/// Entries in the modulation table.
pub const NUM_MOD_SLOTS: usize = 8;
pub const NUM_LFOS: usize = 2;
pub const NUM_ENVELOPES: usize = 2;
