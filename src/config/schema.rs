//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{StealPolicy, MAX_VOICES};
use crate::params::Parameters;
use crate::sample::{LoopSettings, NoteRange, MAX_NOTE};

/// A playable instrument patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Audio and MIDI device settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Voice allocation
    #[serde(default)]
    pub engine: EngineConfig,

    /// Initial parameter values
    #[serde(default)]
    pub parameters: Parameters,

    /// Samples, in key-range priority order
    #[serde(default)]
    pub samples: Vec<SampleConfig>,
}

impl SamplerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate audio settings
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 16 || self.audio.buffer_size > 8192 {
            bail!("Buffer size must be between 16 and 8192");
        }

        if self.engine.polyphony == 0 || self.engine.polyphony > MAX_VOICES {
            bail!("Polyphony must be between 1 and {}", MAX_VOICES);
        }

        if let Some((id, value)) = self.parameters.out_of_range() {
            let (min, max) = id.range();
            bail!("Parameter {} = {} is outside {}..{}", id, value, min, max);
        }

        for sample in &self.samples {
            let label = sample.path.display();
            if sample.root_note > MAX_NOTE {
                bail!("Sample '{}': root note {} is above {}", label, sample.root_note, MAX_NOTE);
            }
            if sample.note_range.lowest > sample.note_range.highest {
                bail!(
                    "Sample '{}': lowest note {} is above highest note {}",
                    label,
                    sample.note_range.lowest,
                    sample.note_range.highest
                );
            }
            if sample.note_range.highest > MAX_NOTE {
                bail!("Sample '{}': note range ends above {}", label, MAX_NOTE);
            }
            let looping = &sample.loop_settings;
            if !(0.0..=1.0).contains(&looping.start) || !(0.0..=1.0).contains(&looping.end) {
                bail!("Sample '{}': loop points must be between 0.0 and 1.0", label);
            }
            if looping.enabled && looping.start >= looping.end {
                bail!(
                    "Sample '{}': loop start {} must be before loop end {}",
                    label,
                    looping.start,
                    looping.end
                );
            }
        }

        Ok(())
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Block size in frames (default: 512)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,

    /// MIDI input port name, matched by substring (None = first port)
    #[serde(default)]
    pub midi_port: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
            midi_port: None,
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> usize { 512 }

/// Voice allocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Simultaneous voices (default: 16)
    #[serde(default = "default_polyphony")]
    pub polyphony: usize,

    /// What happens when every voice is busy
    #[serde(default)]
    pub steal_policy: StealPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polyphony: default_polyphony(),
            steal_policy: StealPolicy::default(),
        }
    }
}

fn default_polyphony() -> usize { MAX_VOICES }

/// One sample of the patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Audio file, relative to the patch file
    pub path: PathBuf,

    /// Note at which the sample plays at its recorded pitch (default: 60)
    #[serde(default = "default_root_note")]
    pub root_note: u8,

    /// Display name (default: file stem)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub note_range: NoteRange,

    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSettings,
}

fn default_root_note() -> u8 { 60 }
