// Purpose: The FM voice and everything it renders from
// This layer sits above the dsp primitives: routing, snapshots, handoff

#[cfg(feature = "rtrb")]
pub mod handoff;
pub mod modulation;
pub mod params;
pub mod voice;

pub use modulation::{Destination, DirectLfoRoute, ModSlot, ModSource, OpIndex};
pub use params::{EnvelopeSource, OperatorParams, ParameterSnapshot};
pub use voice::{FmVoice, SoundTag, VoiceState};
