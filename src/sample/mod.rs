//! Sample data and storage
//!
//! Decoded audio plus the key-range, root-note and loop metadata that
//! decides how a voice plays it back.

mod decoder;
mod store;

pub use decoder::{DecodeError, DecodedAudio, Decoder, WavDecoder};
pub use store::SampleStore;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum MIDI note number
pub const MAX_NOTE: u8 = 127;

/// Direction of travel through the loop region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    Forward,
    Backward,
    PingPong,
}

impl LoopMode {
    /// Mode for an index; out-of-range indices clamp
    pub fn from_index(index: i32) -> Self {
        match index {
            i if i <= 0 => LoopMode::Forward,
            1 => LoopMode::Backward,
            _ => LoopMode::PingPong,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Loop region as fractions of the sample length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    pub start: f32,
    pub end: f32,
    pub enabled: bool,
    pub mode: LoopMode,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            start: 0.25,
            end: 0.75,
            enabled: false,
            mode: LoopMode::Forward,
        }
    }
}

impl LoopSettings {
    /// Check that start and end form a non-empty region inside [0, 1]
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.start) && (0.0..=1.0).contains(&self.end) && self.start < self.end
    }

    /// Points inside [0, 1], and a non-empty region when enabled
    pub fn is_acceptable(&self) -> bool {
        let in_range = (0.0..=1.0).contains(&self.start) && (0.0..=1.0).contains(&self.end);
        in_range && (!self.enabled || self.start < self.end)
    }

    /// Loop boundaries in frames for a sample of `frames` frames.
    ///
    /// `None` when looping is off or the region collapses to nothing.
    pub fn frame_bounds(&self, frames: usize) -> Option<(f64, f64)> {
        if !self.enabled || !self.is_valid() {
            return None;
        }

        let length = frames as f64;
        let start = (f64::from(self.start) * length).floor();
        let end = (f64::from(self.end) * length).floor().min(length);
        (end > start).then_some((start, end))
    }
}

/// Inclusive range of MIDI notes a sample answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteRange {
    pub lowest: u8,
    pub highest: u8,
}

impl Default for NoteRange {
    fn default() -> Self {
        Self {
            lowest: 0,
            highest: MAX_NOTE,
        }
    }
}

impl NoteRange {
    pub fn new(lowest: u8, highest: u8) -> Self {
        Self { lowest, highest }
    }

    /// Ordered and within the MIDI note range
    pub fn is_valid(&self) -> bool {
        self.lowest <= self.highest && self.highest <= MAX_NOTE
    }

    pub fn contains(&self, note: u8) -> bool {
        (self.lowest..=self.highest).contains(&note)
    }
}

/// A loaded sample.
///
/// The audio is fixed once loaded; only the metadata fields are edited.
#[derive(Debug, Clone)]
pub struct Sample {
    id: u64,
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
    pub root_note: u8,
    pub note_range: NoteRange,
    pub loop_settings: LoopSettings,
    pub name: String,
    /// File the audio was decoded from, kept so saved state can reload it
    pub source_path: Option<PathBuf>,
}

impl Sample {
    fn new(id: u64, audio: DecodedAudio, root_note: u8) -> Self {
        let DecodedAudio {
            mut channels,
            sample_rate,
        } = audio;

        channels.truncate(2);
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }

        Self {
            id,
            channels,
            sample_rate: f64::from(sample_rate.max(1)),
            root_note: root_note.min(MAX_NOTE),
            note_range: NoteRange::default(),
            loop_settings: LoopSettings::default(),
            name: String::new(),
            source_path: None,
        }
    }

    /// Set the root note, clamped to the MIDI range
    pub fn set_root_note(&mut self, note: u8) {
        if note > MAX_NOTE {
            warn!("sample '{}': root note {} clamped to {}", self.name, note, MAX_NOTE);
        }
        self.root_note = note.min(MAX_NOTE);
    }

    /// Replace the note range; an inverted or out-of-range one is rejected
    pub fn set_note_range(&mut self, range: NoteRange) -> bool {
        if !range.is_valid() {
            warn!(
                "sample '{}': ignoring note range {}-{}",
                self.name, range.lowest, range.highest
            );
            return false;
        }
        self.note_range = range;
        true
    }

    /// Replace the loop settings; points outside [0, 1] or an empty enabled
    /// region are rejected
    pub fn set_loop_settings(&mut self, settings: LoopSettings) -> bool {
        if !settings.is_acceptable() {
            warn!(
                "sample '{}': ignoring loop {}-{} (enabled: {})",
                self.name, settings.start, settings.end, settings.enabled
            );
            return false;
        }
        self.loop_settings = settings;
        true
    }

    /// Store-unique identity, never reused
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length in frames
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel, if present
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Recording sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate
    }
}
