//! Sample playback voice
//!
//! One polyphonic playback unit: variable-speed resampling of a stored
//! sample through the loop region, shaped by its own ADSR envelope.
//!
//! A voice refers to its sample by store index plus sample id and never
//! holds the audio itself; it publishes metering to its own slot.

use crate::buffer::StereoBuffer;
use crate::engine::Telemetry;
use crate::params::EnvelopeParameters;
use crate::sample::{LoopMode, Sample, SampleStore};

use super::envelope::{Envelope, EnvelopeStage};
use super::modulation::{ModulationDestination, ModulationMatrix, ModulationSource};

/// Non-owning link to the sample a voice plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SampleRef {
    index: usize,
    id: u64,
}

/// Read-only collaborators a voice renders against
pub struct RenderContext<'a> {
    pub samples: &'a SampleStore,
    pub modulation: &'a ModulationMatrix,
    pub telemetry: &'a Telemetry,
}

/// A single sample playback voice
pub struct Voice {
    slot: usize,
    sample: Option<SampleRef>,
    position: f64,
    increment: f64,
    looping_forward: bool,
    note: u8,
    velocity: f32,
    envelope: Envelope,
    active: bool,
    serial: u64,
    normalized_position: f32,
    sample_rate: f64,
}

impl Voice {
    /// Create an idle voice for pool slot `slot`
    pub fn new(slot: usize, sample_rate: f64) -> Self {
        Self {
            slot,
            sample: None,
            position: 0.0,
            increment: 0.0,
            looping_forward: true,
            note: 0,
            velocity: 0.0,
            envelope: Envelope::new(sample_rate as f32),
            active: false,
            serial: 0,
            normalized_position: 0.0,
            sample_rate: sample_rate.max(1.0),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.envelope.set_sample_rate(self.sample_rate as f32);
    }

    /// Start playing `note`.
    ///
    /// Returns false, and stays silent, when no sample plays the note or the
    /// matching sample is empty.
    pub fn start_note(
        &mut self,
        note: u8,
        velocity: f32,
        samples: &SampleStore,
        modulation: &mut ModulationMatrix,
        envelope: &EnvelopeParameters,
        telemetry: &Telemetry,
    ) -> bool {
        self.envelope.configure(envelope);

        let found = samples
            .index_for_note(note)
            .and_then(|index| samples.get(index).map(|sample| (index, sample)))
            .filter(|(_, sample)| sample.frame_count() > 0);
        let Some((index, sample)) = found else {
            self.clear_note(telemetry);
            return false;
        };

        self.sample = Some(SampleRef {
            index,
            id: sample.id(),
        });
        self.note = note;
        self.velocity = velocity.clamp(0.0, 1.0);

        let pitch_ratio = 2f64.powf((f64::from(note) - f64::from(sample.root_note)) / 12.0);
        self.increment = pitch_ratio * sample.sample_rate() / self.sample_rate;

        self.position = 0.0;
        self.normalized_position = 0.0;
        self.looping_forward = true;

        modulation.set_source(ModulationSource::Velocity, self.velocity);
        modulation.set_source(ModulationSource::KeyTrack, f32::from(note) / 127.0);

        self.envelope.note_on();
        self.active = true;
        telemetry.publish_voice(self.slot, 0.0, true);
        true
    }

    /// Stop the note, either through the release tail or immediately
    pub fn stop_note(&mut self, allow_tail: bool, telemetry: &Telemetry) {
        if allow_tail {
            self.envelope.note_off();
        } else {
            self.clear_note(telemetry);
        }
    }

    /// Mix `num_samples` frames into `out`, starting at frame `start`
    pub fn render_next_block(
        &mut self,
        out: &mut StereoBuffer,
        start: usize,
        num_samples: usize,
        ctx: &RenderContext<'_>,
    ) {
        let Some(sample) = self.current_sample(ctx.samples) else {
            self.clear_note(ctx.telemetry);
            return;
        };
        if !self.active || !self.envelope.is_active() {
            self.clear_note(ctx.telemetry);
            return;
        }

        let frames = sample.frame_count();
        let length = frames as f64;
        let left = sample.channel(0).unwrap_or(&[]);
        let right = sample.channel(1);
        // Snapshot once so a loop edit never lands halfway through a block
        let loop_settings = sample.loop_settings;
        let loop_bounds = loop_settings.frame_bounds(frames);

        let pitch_mod = ctx.modulation.modulation(ModulationDestination::Pitch)
            + ctx.modulation.source(ModulationSource::PitchBend);
        let increment = self.increment * 2f64.powf(f64::from(pitch_mod));

        let end = (start + num_samples).min(out.len());
        for frame in start..end {
            self.normalized_position = (self.position / length) as f32;

            let (l, r) = read_frame(left, right, self.position);
            let gain = self.envelope.next_sample() * self.velocity;
            out.add(frame, l * gain, r * gain);

            match loop_bounds {
                Some((loop_start, loop_end)) if self.position >= loop_start => {
                    self.advance_in_loop(increment, loop_start, loop_end, loop_settings.mode);
                }
                _ => {
                    self.position += increment;
                    if self.position >= length {
                        self.position = length;
                        if self.envelope.stage() != EnvelopeStage::Release {
                            self.envelope.note_off();
                            break;
                        }
                    }
                }
            }

            if !self.envelope.is_active() {
                self.clear_note(ctx.telemetry);
                return;
            }
        }

        ctx.telemetry
            .publish_voice(self.slot, self.normalized_position, self.active);
    }

    fn advance_in_loop(&mut self, increment: f64, loop_start: f64, loop_end: f64, mode: LoopMode) {
        let span = loop_end - loop_start;

        match mode {
            LoopMode::Forward => {
                self.position += increment;
                if self.position >= loop_end {
                    self.position = loop_start + (self.position - loop_end) % span;
                }
            }
            LoopMode::Backward => {
                self.position -= increment;
                if self.position <= loop_start {
                    self.position = loop_end - (loop_start - self.position) % span;
                }
            }
            LoopMode::PingPong => {
                if self.looping_forward {
                    self.position += increment;
                    if self.position >= loop_end {
                        self.position = loop_end - (self.position - loop_end);
                        self.looping_forward = false;
                    }
                } else {
                    self.position -= increment;
                    if self.position <= loop_start {
                        self.position = loop_start + (loop_start - self.position);
                        self.looping_forward = true;
                    }
                }
                self.position = self.position.clamp(loop_start, loop_end);
            }
        }
    }

    /// Sample this voice plays, if it is still in the store
    fn current_sample<'s>(&self, samples: &'s SampleStore) -> Option<&'s Sample> {
        let link = self.sample?;
        samples.get(link.index).filter(|s| s.id() == link.id)
    }

    fn clear_note(&mut self, telemetry: &Telemetry) {
        self.active = false;
        self.sample = None;
        self.position = 0.0;
        self.normalized_position = 0.0;
        self.envelope.reset();
        telemetry.publish_voice(self.slot, 0.0, false);
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Check if the voice is sounding its release tail
    pub fn is_releasing(&self) -> bool {
        self.active && self.envelope.stage() == EnvelopeStage::Release
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Playback position in frames
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Position increment per output frame before modulation
    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Position as a fraction of the sample length, as last rendered
    pub fn normalized_position(&self) -> f32 {
        self.normalized_position
    }

    pub fn looping_forward(&self) -> bool {
        self.looping_forward
    }

    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    /// Allocation order stamp
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn set_serial(&mut self, serial: u64) {
        self.serial = serial;
    }
}

/// Linearly interpolated frame at a fractional position; silence outside the sample
#[inline]
fn read_frame(left: &[f32], right: Option<&[f32]>, position: f64) -> (f32, f32) {
    let frames = left.len();
    if frames == 0 || position < 0.0 || position >= frames as f64 {
        return (0.0, 0.0);
    }

    let index = (position as usize).min(frames - 1);
    let fraction = (position - index as f64) as f32;

    let interpolate = |data: &[f32]| {
        let current = data.get(index).copied().unwrap_or(0.0);
        match data.get(index + 1) {
            Some(&next) if index + 1 < frames => current * (1.0 - fraction) + next * fraction,
            _ => current,
        }
    };

    let l = interpolate(left);
    let r = right.map_or(l, interpolate);
    (l, r)
}
