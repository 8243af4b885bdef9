//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Example patch written by `sampler init`
pub const EXAMPLE_CONFIG: &str = include_str!("../../sampler.example.yaml");

/// Load a patch from a YAML file.
///
/// Relative sample paths are resolved against the patch file's directory.
pub fn load_config(path: &Path) -> Result<SamplerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let mut config: SamplerConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config.validate()?;

    if let Some(base) = path.parent() {
        for sample in &mut config.samples {
            if sample.path.is_relative() {
                sample.path = base.join(&sample.path);
            }
        }
    }

    debug!(
        "loaded config {} ({} samples, {} voices)",
        path.display(),
        config.samples.len(),
        config.engine.polyphony
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StealPolicy;
    use crate::sample::LoopMode;
    use crate::synth::LfoWaveform;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
audio:
  sample_rate: 48000
  buffer_size: 256

samples: []
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.engine.polyphony, 16);
        assert_eq!(config.engine.steal_policy, StealPolicy::Oldest);
        assert_eq!(config.parameters.master_volume, 0.7);
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patch.yaml");
        let yaml = r#"
engine:
  polyphony: 8
  steal_policy: quietest

parameters:
  master_volume: 0.5
  filter:
    cutoff: 2500.0
  lfos:
    - rate: 4.0
      amount: 0.5
      waveform: triangle
    - {}
    - waveform: random

samples:
  - path: kit/piano.wav
    root_note: 64
    note_range: { lowest: 40, highest: 80 }
    loop:
      start: 0.1
      end: 0.9
      enabled: true
      mode: ping_pong
  - path: /abs/bass.wav
"#;
        std::fs::write(&path, yaml).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.engine.polyphony, 8);
        assert_eq!(config.engine.steal_policy, StealPolicy::Quietest);
        assert_eq!(config.parameters.master_volume, 0.5);
        assert_eq!(config.parameters.filter.cutoff, 2500.0);
        assert_eq!(config.parameters.filter.resonance, 1.0);
        assert_eq!(config.parameters.lfos[0].waveform, LfoWaveform::Triangle);
        assert_eq!(config.parameters.lfos[2].waveform, LfoWaveform::Random);

        let piano = &config.samples[0];
        assert_eq!(piano.path, dir.path().join("kit/piano.wav"));
        assert_eq!(piano.root_note, 64);
        assert_eq!(piano.note_range.lowest, 40);
        assert_eq!(piano.loop_settings.mode, LoopMode::PingPong);
        assert!(piano.loop_settings.enabled);

        let bass = &config.samples[1];
        assert_eq!(bass.path, Path::new("/abs/bass.wav"));
        assert_eq!(bass.root_note, 60);
        assert!(!bass.loop_settings.enabled);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"engine:\n  polyphony: 40\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config: SamplerConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.samples.is_empty());
    }
}
