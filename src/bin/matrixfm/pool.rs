//! Fixed pool of FM voices driven by note messages from the control thread.

use matrix_fm::{
    synth::{handoff::ParamReceiver, FmVoice, VoiceState},
    MAX_BLOCK_SIZE,
};
use rtrb::Consumer;

const MOD_WHEEL_CC: u8 = 1;

#[derive(Debug, Copy, Clone)]
pub enum NoteMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ModWheel(u8),
    AllNotesOff,
}

pub struct VoicePool {
    voices: Vec<FmVoice>,
    ages: Vec<u64>,
    notes: Consumer<NoteMessage>,
    params: ParamReceiver,
    frame_counter: u64,
}

impl VoicePool {
    pub fn new(
        sample_rate: f64,
        max_voices: usize,
        notes: Consumer<NoteMessage>,
        params: ParamReceiver,
    ) -> Self {
        let voices = (0..max_voices)
            .map(|_| {
                let mut voice = FmVoice::new();
                voice.prepare(sample_rate, MAX_BLOCK_SIZE);
                voice
            })
            .collect();

        Self {
            voices,
            ages: vec![0; max_voices],
            notes,
            params,
            frame_counter: 0,
        }
    }

    /// Render one mono block. `out` must not exceed `MAX_BLOCK_SIZE`.
    pub fn render_block(&mut self, out: &mut [f32]) {
        // Snapshots land at block boundaries only
        if let Some(snapshot) = self.params.latest() {
            for voice in &mut self.voices {
                voice.set_current_params(&snapshot);
            }
        }

        while let Ok(msg) = self.notes.pop() {
            match msg {
                NoteMessage::NoteOn { note, velocity } => {
                    let age = self.frame_counter;
                    if let Some(idx) = self.allocate_voice() {
                        self.ages[idx] = age;
                        self.voices[idx].start_note(note, velocity as f32 / 127.0, 0);
                    }
                }
                NoteMessage::NoteOff { note } => {
                    if let Some(voice) = self
                        .voices
                        .iter_mut()
                        .find(|v| v.note() == note && v.state() == VoiceState::Active)
                    {
                        voice.stop_note(true);
                    }
                }
                NoteMessage::ModWheel(value) => {
                    for voice in &mut self.voices {
                        voice.controller_moved(MOD_WHEEL_CC, value);
                    }
                }
                NoteMessage::AllNotesOff => {
                    for voice in &mut self.voices {
                        voice.stop_note(true);
                    }
                }
            }
        }

        out.fill(0.0);
        let len = out.len();
        let mut channels = [out];
        for voice in &mut self.voices {
            voice.render_next_block(&mut channels, 0, len);
        }

        self.frame_counter += len as u64;
    }

    fn allocate_voice(&self) -> Option<usize> {
        if let Some(idx) = self.voices.iter().position(|v| v.state() == VoiceState::Idle) {
            return Some(idx);
        }

        // Steal the oldest releasing voice
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.state() == VoiceState::Releasing)
            .min_by_key(|(idx, _)| self.ages[*idx])
            .map(|(idx, _)| idx)
    }
}
