//! Persisted sampler state
//!
//! Everything needed to rebuild a session: the flat parameter mapping and,
//! per sample, where to reload the audio from plus its playback metadata.
//! Audio itself is never saved.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sample::{LoopMode, LoopSettings, NoteRange, Sample};

/// Error types for reading and writing saved state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to access state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed state: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Saved session.
///
/// Either section may be absent; restoring leaves the matching part of the
/// engine as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<SampleState>>,
}

/// Saved metadata of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleState {
    pub path: PathBuf,
    #[serde(default)]
    pub name: String,
    pub root_note: u8,
    pub lowest_note: u8,
    pub highest_note: u8,
    pub loop_start: f32,
    pub loop_end: f32,
    pub loop_enabled: bool,
    #[serde(default)]
    pub loop_mode: LoopMode,
}

impl SampleState {
    /// Capture a sample's metadata; `None` for samples not loaded from a file
    pub fn capture(sample: &Sample) -> Option<Self> {
        let path = sample.source_path.clone()?;
        Some(Self {
            path,
            name: sample.name.clone(),
            root_note: sample.root_note,
            lowest_note: sample.note_range.lowest,
            highest_note: sample.note_range.highest,
            loop_start: sample.loop_settings.start,
            loop_end: sample.loop_settings.end,
            loop_enabled: sample.loop_settings.enabled,
            loop_mode: sample.loop_settings.mode,
        })
    }

    /// Write the saved metadata back onto a reloaded sample.
    ///
    /// The root note is clamped; an invalid note range or loop is dropped
    /// and the sample keeps its current one.
    pub fn apply(&self, sample: &mut Sample) {
        if !self.name.is_empty() {
            sample.name = self.name.clone();
        }
        sample.set_root_note(self.root_note);
        sample.set_note_range(NoteRange::new(self.lowest_note, self.highest_note));
        sample.set_loop_settings(LoopSettings {
            start: self.loop_start,
            end: self.loop_end,
            enabled: self.loop_enabled,
            mode: self.loop_mode,
        });
    }
}

impl SamplerState {
    /// True when neither section is present
    pub fn is_empty(&self) -> bool {
        self.parameters.is_none() && self.samples.is_none()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.as_ref().map_or(0, BTreeMap::len)
    }

    /// Saved samples, empty when the section is absent
    pub fn sample_states(&self) -> &[SampleState] {
        self.samples.as_deref().unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StateError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Write state to a JSON file
pub fn save(path: &Path, state: &SamplerState) -> Result<(), StateError> {
    fs::write(path, state.to_json()?)?;
    Ok(())
}

/// Read state from a JSON file
pub fn load(path: &Path) -> Result<SamplerState, StateError> {
    let bytes = fs::read(path)?;
    SamplerState::from_json(&bytes)
}
