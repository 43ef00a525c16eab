//! matrixfm - plays an FM arpeggio on the default output device
//!
//! Run with: cargo run --release
//! Set RUST_LOG=debug to see voice preparation.

mod pool;

use std::{thread, time::Duration};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info, warn};
use matrix_fm::{
    dsp::{lfo::LfoWaveform, OperatorMode},
    synth::{
        handoff::snapshot_channel, Destination, DirectLfoRoute, EnvelopeSource, ParameterSnapshot,
    },
    MAX_BLOCK_SIZE,
};
use pool::{NoteMessage, VoicePool};
use rtrb::RingBuffer;

const NUM_VOICES: usize = 8;
const ARPEGGIO: [u8; 8] = [48, 55, 60, 63, 67, 70, 72, 67];
const STEP: Duration = Duration::from_millis(180);
const GATE: Duration = Duration::from_millis(120);

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f64;
    let channels = config.channels() as usize;
    info!("{} Hz, {} channels, {} voices", sample_rate, channels, NUM_VOICES);

    let (mut notes_tx, notes_rx) = RingBuffer::<NoteMessage>::new(64);
    let (mut params_tx, params_rx) = snapshot_channel(4);

    let mut patch = init_patch()?;
    params_tx.publish(patch);

    let mut pool = VoicePool::new(sample_rate, NUM_VOICES, notes_rx, params_rx);
    let mut render_buf = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let block = &mut render_buf[..frames];
                    pool.render_block(block);

                    // Mono to all channels
                    let out_off = frames_written * channels;
                    for (i, &s) in block.iter().enumerate() {
                        for ch in 0..channels {
                            data[out_off + i * channels + ch] = s;
                        }
                    }

                    frames_written += frames;
                }
            },
            |err| error!("audio stream error: {}", err),
            None,
        )
        .wrap_err("failed to build output stream")?;

    stream.play().wrap_err("failed to start output stream")?;
    info!("playing, press Ctrl+C to stop");

    let mut step = 0usize;
    loop {
        let note = ARPEGGIO[step % ARPEGGIO.len()];

        // Slow filter sweep and wheel ramp, one cycle every 64 steps
        let sweep = (step % 64) as f32 / 64.0;
        patch.operators[2].context1 = 0.15 + 0.5 * (sweep * std::f32::consts::TAU).sin().abs();
        params_tx.publish(patch);

        if step % 16 == 0 {
            let wheel = ((step / 16) % 4) as u8 * 42;
            let _ = notes_tx.push(NoteMessage::ModWheel(wheel));
        }

        if notes_tx.push(NoteMessage::NoteOn { note, velocity: 100 }).is_err() {
            warn!("note queue full, dropping note {}", note);
        }
        thread::sleep(GATE);
        let _ = notes_tx.push(NoteMessage::NoteOff { note });
        thread::sleep(STEP - GATE);

        step += 1;
        if step % 512 == 0 {
            let _ = notes_tx.push(NoteMessage::AllNotesOff);
        }
    }
}

/// Two-operator stack into a resonant low-pass, with the wheel opening the
/// modulation index and LFO 1 wobbling it.
fn init_patch() -> EyreResult<ParameterSnapshot> {
    let mut patch = ParameterSnapshot::default();

    patch.envelopes[0].attack = 0.005;
    patch.envelopes[0].decay = 0.3;
    patch.envelopes[0].sustain = 0.5;
    patch.envelopes[0].release = 0.4;
    patch.envelopes[1].attack = 0.001;
    patch.envelopes[1].decay = 0.15;
    patch.envelopes[1].sustain = 0.1;
    patch.envelopes[1].release = 0.2;

    // Op 0: modulator, follows the short envelope
    patch.operators[0].ratio = 2.0;
    patch.operators[0].gain = 0.0;
    patch.operators[0].gain_out = 0.05;
    patch.operators[0].envelope = EnvelopeSource::Secondary;

    // Op 1: carrier, phase-modulated by op 0
    patch.operators[1].ratio = 1.0;
    patch.operators[1].gain = 0.9;
    patch.matrix[1][0] = 0.6;

    // Op 2: low-pass on the carrier
    patch.operators[2].mode = OperatorMode::LowPass;
    patch.operators[2].gain = 1.0;
    patch.operators[2].context1 = 0.3;
    patch.operators[2].context2 = 0.2;

    patch.lfos[0].frequency = 0.5;
    patch.lfos[0].amount = 1.0;
    patch.lfos[0].waveform = LfoWaveform::from_index(1).wrap_err("bad LFO waveform")?;
    patch.lfo_routes[0] = DirectLfoRoute {
        destination: Destination::matrix_cell(1, 0)?,
        depth: 0.3,
    };

    // Slot 0: mod wheel deepens the modulation
    patch.set_slot(0, 2, Destination::matrix_cell(1, 0)?.index(), 0.4)?;

    Ok(patch)
}
