//! Events delivered to the audio thread
//!
//! Note, controller and sample-metadata edits all travel through one queue
//! and are applied at the dispatch step of a block.

use std::collections::VecDeque;

use crate::params::ParameterId;
use crate::sample::{LoopSettings, NoteRange};

/// Controller numbers with a fixed meaning
pub const CC_MOD_WHEEL: u8 = 1;
pub const CC_VOLUME: u8 = 7;
pub const CC_RESONANCE: u8 = 71;
pub const CC_RELEASE: u8 = 72;
pub const CC_ATTACK: u8 = 73;
pub const CC_CUTOFF: u8 = 74;
pub const CC_DECAY: u8 = 75;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Pitch wheel centre position
pub const PITCH_BEND_CENTER: u16 = 8192;

/// Something the sampler reacts to at the start of a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerEvent {
    /// Note on: note (0-127), velocity (1-127)
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Pitch wheel (0-16383, centre at 8192)
    PitchBend { value: u16 },
    /// Control change: controller (0-127), value (0-127)
    Controller { number: u8, value: u8 },
    /// Channel pressure (0-127)
    Aftertouch { value: u8 },
    AllNotesOff,
    /// Replace the loop settings of the sample at `sample`
    SetLoop { sample: usize, settings: LoopSettings },
    /// Replace the note range of the sample at `sample`
    SetNoteRange { sample: usize, range: NoteRange },
}

impl SamplerEvent {
    /// Note on, folding velocity 0 into a note off
    pub fn note_on(note: u8, velocity: u8) -> Self {
        let note = note & 0x7F;
        match velocity & 0x7F {
            0 => SamplerEvent::NoteOff { note },
            velocity => SamplerEvent::NoteOn { note, velocity },
        }
    }

    /// Parse a raw MIDI channel message. The channel is ignored.
    pub fn from_midi(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let data1 = bytes.get(1).map(|b| b & 0x7F);
        let data2 = bytes.get(2).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(SamplerEvent::NoteOff { note: data1? }),
            0x90 => Some(SamplerEvent::note_on(data1?, data2?)),
            0xB0 => {
                let number = data1?;
                let value = data2?;
                match number {
                    CC_ALL_SOUND_OFF | CC_ALL_NOTES_OFF => Some(SamplerEvent::AllNotesOff),
                    _ => Some(SamplerEvent::Controller { number, value }),
                }
            }
            0xD0 => Some(SamplerEvent::Aftertouch { value: data1? }),
            0xE0 => {
                let lsb = u16::from(data1?);
                let msb = u16::from(data2?);
                Some(SamplerEvent::PitchBend {
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }
}

/// Pitch wheel position in octaves (±2 semitones)
pub fn pitch_bend_octaves(value: u16) -> f32 {
    let semitones = (f32::from(value) - f32::from(PITCH_BEND_CENTER)) / f32::from(PITCH_BEND_CENTER) * 2.0;
    semitones / 12.0
}

/// Engine parameter a sound controller drives, if any
pub fn controller_parameter(number: u8) -> Option<ParameterId> {
    match number {
        CC_VOLUME => Some(ParameterId::MasterVolume),
        CC_RESONANCE => Some(ParameterId::FilterResonance),
        CC_RELEASE => Some(ParameterId::EnvRelease),
        CC_ATTACK => Some(ParameterId::EnvAttack),
        CC_CUTOFF => Some(ParameterId::FilterCutoff),
        CC_DECAY => Some(ParameterId::EnvDecay),
        _ => None,
    }
}

/// Scale a 7-bit controller value into `id`'s range.
///
/// Cutoff follows an exponential curve so each step is the same interval.
pub fn controller_value(id: ParameterId, value: u8) -> f32 {
    let (min, max) = id.range();
    let t = f32::from(value.min(127)) / 127.0;
    match id {
        ParameterId::FilterCutoff => min * (max / min).powf(t),
        _ => min + (max - min) * t,
    }
}

/// Queue the sampler drains at the start of each block
pub trait EventSource {
    fn pop(&mut self) -> Option<SamplerEvent>;
}

impl EventSource for rtrb::Consumer<SamplerEvent> {
    fn pop(&mut self) -> Option<SamplerEvent> {
        rtrb::Consumer::pop(self).ok()
    }
}

impl EventSource for VecDeque<SamplerEvent> {
    fn pop(&mut self) -> Option<SamplerEvent> {
        self.pop_front()
    }
}
