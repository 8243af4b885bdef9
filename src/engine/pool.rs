//! Voice pool
//!
//! Owns the voices directly and decides which one takes a new note.

use serde::{Deserialize, Serialize};

use crate::buffer::StereoBuffer;
use crate::params::EnvelopeParameters;
use crate::sample::SampleStore;
use crate::synth::{ModulationMatrix, RenderContext, Voice};

use super::telemetry::{Telemetry, MAX_VOICES};

/// What to do with a new note when every voice is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StealPolicy {
    /// Oldest releasing voice, else the oldest sounding one
    #[default]
    Oldest,
    /// Voice with the lowest envelope level
    Quietest,
    /// Drop the new note
    #[serde(rename = "none")]
    Refuse,
}

/// Fixed set of voices, addressed by slot
pub struct VoicePool {
    voices: Vec<Voice>,
    policy: StealPolicy,
    next_serial: u64,
}

impl VoicePool {
    /// Create `polyphony` voices (clamped to 1..=16)
    pub fn new(polyphony: usize, sample_rate: f64, policy: StealPolicy) -> Self {
        let polyphony = polyphony.clamp(1, MAX_VOICES);
        Self {
            voices: (0..polyphony)
                .map(|slot| Voice::new(slot, sample_rate))
                .collect(),
            policy,
            next_serial: 0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    pub fn policy(&self) -> StealPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: StealPolicy) {
        self.policy = policy;
    }

    /// Start a note and return the slot that plays it.
    ///
    /// `None` when no sample can play the note or the policy refuses to steal.
    pub fn note_on(
        &mut self,
        note: u8,
        velocity: f32,
        samples: &SampleStore,
        modulation: &mut ModulationMatrix,
        envelope: &EnvelopeParameters,
        telemetry: &Telemetry,
    ) -> Option<usize> {
        let playable = samples
            .sample_for_note(note)
            .is_some_and(|sample| sample.frame_count() > 0);
        if !playable {
            return None;
        }

        let slot = match self.idle_slot() {
            Some(slot) => slot,
            None => {
                let slot = self.steal_slot()?;
                self.voices[slot].stop_note(false, telemetry);
                slot
            }
        };

        let voice = &mut self.voices[slot];
        if !voice.start_note(note, velocity, samples, modulation, envelope, telemetry) {
            return None;
        }
        self.next_serial += 1;
        voice.set_serial(self.next_serial);
        Some(slot)
    }

    /// Release every sounding voice playing `note`
    pub fn note_off(&mut self, note: u8, telemetry: &Telemetry) {
        for voice in &mut self.voices {
            if voice.is_active() && !voice.is_releasing() && voice.note() == note {
                voice.stop_note(true, telemetry);
            }
        }
    }

    /// Release every voice through its tail
    pub fn all_notes_off(&mut self, telemetry: &Telemetry) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.stop_note(true, telemetry);
        }
    }

    /// Silence every voice immediately
    pub fn kill_all(&mut self, telemetry: &Telemetry) {
        for voice in &mut self.voices {
            voice.stop_note(false, telemetry);
        }
    }

    /// Mix every active voice into `out`
    pub fn render(&mut self, out: &mut StereoBuffer, start: usize, num_samples: usize, ctx: &RenderContext<'_>) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.render_next_block(out, start, num_samples, ctx);
        }
    }

    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn polyphony(&self) -> usize {
        self.voices.len()
    }

    fn idle_slot(&self) -> Option<usize> {
        self.voices.iter().position(|v| !v.is_active())
    }

    fn steal_slot(&self) -> Option<usize> {
        match self.policy {
            StealPolicy::Oldest => self
                .voices
                .iter()
                .filter(|v| v.is_releasing())
                .min_by_key(|v| v.serial())
                .or_else(|| self.voices.iter().min_by_key(|v| v.serial()))
                .map(Voice::slot),
            StealPolicy::Quietest => self
                .voices
                .iter()
                .min_by(|a, b| a.envelope_level().total_cmp(&b.envelope_level()))
                .map(Voice::slot),
            StealPolicy::Refuse => None,
        }
    }
}
