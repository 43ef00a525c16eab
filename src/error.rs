use thiserror::Error;

/// Rejected configuration values.
///
/// These surface while a snapshot is being built from host-side indices,
/// never while rendering: once a value has been converted into its typed form
/// the render path can no longer see an out-of-range index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("modulation destination {0} is outside 0..=54")]
    DestinationOutOfRange(usize),
    #[error("modulation source {0} is outside 0..=2")]
    SourceOutOfRange(usize),
    #[error("LFO waveform {0} is outside 0..=3")]
    WaveformOutOfRange(usize),
    #[error("envelope source {0} is outside 0..=1")]
    EnvelopeSourceOutOfRange(usize),
    #[error("operator {0} is outside 0..=5")]
    OperatorOutOfRange(usize),
    #[error("modulation slot {0} is outside 0..=7")]
    SlotOutOfRange(usize),
}
