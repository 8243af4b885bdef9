//! Engine parameters
//!
//! `Parameters` is the plain snapshot each component reads once per block.
//! `SharedParameters` is the atomic table a control thread writes into and
//! the audio thread snapshots, so neither side ever aliases the other.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::synth::LfoWaveform;

/// Number of LFOs feeding the modulation matrix
pub const LFO_COUNT: usize = 3;

/// Identifier of every automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterId {
    MasterVolume,
    EnvAttack,
    EnvDecay,
    EnvSustain,
    EnvRelease,
    FilterCutoff,
    FilterResonance,
    Lfo1Rate,
    Lfo1Amount,
    Lfo1Waveform,
    Lfo2Rate,
    Lfo2Amount,
    Lfo2Waveform,
    Lfo3Rate,
    Lfo3Amount,
    Lfo3Waveform,
}

impl ParameterId {
    pub const COUNT: usize = 16;

    pub const ALL: [ParameterId; Self::COUNT] = [
        ParameterId::MasterVolume,
        ParameterId::EnvAttack,
        ParameterId::EnvDecay,
        ParameterId::EnvSustain,
        ParameterId::EnvRelease,
        ParameterId::FilterCutoff,
        ParameterId::FilterResonance,
        ParameterId::Lfo1Rate,
        ParameterId::Lfo1Amount,
        ParameterId::Lfo1Waveform,
        ParameterId::Lfo2Rate,
        ParameterId::Lfo2Amount,
        ParameterId::Lfo2Waveform,
        ParameterId::Lfo3Rate,
        ParameterId::Lfo3Amount,
        ParameterId::Lfo3Waveform,
    ];

    /// Stable string identifier used in saved state and on the command line
    pub fn name(self) -> &'static str {
        match self {
            ParameterId::MasterVolume => "master_volume",
            ParameterId::EnvAttack => "env_attack",
            ParameterId::EnvDecay => "env_decay",
            ParameterId::EnvSustain => "env_sustain",
            ParameterId::EnvRelease => "env_release",
            ParameterId::FilterCutoff => "filter_cutoff",
            ParameterId::FilterResonance => "filter_resonance",
            ParameterId::Lfo1Rate => "lfo1_rate",
            ParameterId::Lfo1Amount => "lfo1_amount",
            ParameterId::Lfo1Waveform => "lfo1_waveform",
            ParameterId::Lfo2Rate => "lfo2_rate",
            ParameterId::Lfo2Amount => "lfo2_amount",
            ParameterId::Lfo2Waveform => "lfo2_waveform",
            ParameterId::Lfo3Rate => "lfo3_rate",
            ParameterId::Lfo3Amount => "lfo3_amount",
            ParameterId::Lfo3Waveform => "lfo3_waveform",
        }
    }

    /// Inclusive value range
    pub fn range(self) -> (f32, f32) {
        match self {
            ParameterId::MasterVolume => (0.0, 1.0),
            ParameterId::EnvAttack | ParameterId::EnvDecay => (0.0, 5.0),
            ParameterId::EnvSustain => (0.0, 1.0),
            ParameterId::EnvRelease => (0.0, 10.0),
            ParameterId::FilterCutoff => (20.0, 20_000.0),
            ParameterId::FilterResonance => (0.1, 10.0),
            ParameterId::Lfo1Rate | ParameterId::Lfo2Rate | ParameterId::Lfo3Rate => (0.01, 20.0),
            ParameterId::Lfo1Amount | ParameterId::Lfo2Amount | ParameterId::Lfo3Amount => {
                (0.0, 1.0)
            }
            ParameterId::Lfo1Waveform | ParameterId::Lfo2Waveform | ParameterId::Lfo3Waveform => {
                (0.0, 4.0)
            }
        }
    }

    /// Clamp `value` into this parameter's range
    pub fn clamp(self, value: f32) -> f32 {
        let (min, max) = self.range();
        if value.is_nan() {
            return min;
        }
        value.clamp(min, max)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter '{0}'")]
pub struct UnknownParameter(pub String);

impl FromStr for ParameterId {
    type Err = UnknownParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| UnknownParameter(s.to_string()))
    }
}

/// Envelope timing (seconds) and sustain level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeParameters {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for EnvelopeParameters {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.8,
            release: 0.5,
        }
    }
}

/// Low-pass filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParameters {
    /// Cutoff in Hz
    pub cutoff: f32,
    pub resonance: f32,
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            cutoff: 1000.0,
            resonance: 1.0,
        }
    }
}

/// One LFO's rate, depth and shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfoParameters {
    /// Rate in Hz
    pub rate: f32,
    pub amount: f32,
    pub waveform: LfoWaveform,
}

impl Default for LfoParameters {
    fn default() -> Self {
        Self {
            rate: 1.0,
            amount: 0.0,
            waveform: LfoWaveform::Sine,
        }
    }
}

/// Snapshot of every engine parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub master_volume: f32,
    pub envelope: EnvelopeParameters,
    pub filter: FilterParameters,
    pub lfos: [LfoParameters; LFO_COUNT],
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            master_volume: 0.7,
            envelope: EnvelopeParameters::default(),
            filter: FilterParameters::default(),
            lfos: [LfoParameters::default(); LFO_COUNT],
        }
    }
}

impl Parameters {
    /// Read a parameter by id
    pub fn get(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::MasterVolume => self.master_volume,
            ParameterId::EnvAttack => self.envelope.attack,
            ParameterId::EnvDecay => self.envelope.decay,
            ParameterId::EnvSustain => self.envelope.sustain,
            ParameterId::EnvRelease => self.envelope.release,
            ParameterId::FilterCutoff => self.filter.cutoff,
            ParameterId::FilterResonance => self.filter.resonance,
            ParameterId::Lfo1Rate => self.lfos[0].rate,
            ParameterId::Lfo1Amount => self.lfos[0].amount,
            ParameterId::Lfo1Waveform => self.lfos[0].waveform.index() as f32,
            ParameterId::Lfo2Rate => self.lfos[1].rate,
            ParameterId::Lfo2Amount => self.lfos[1].amount,
            ParameterId::Lfo2Waveform => self.lfos[1].waveform.index() as f32,
            ParameterId::Lfo3Rate => self.lfos[2].rate,
            ParameterId::Lfo3Amount => self.lfos[2].amount,
            ParameterId::Lfo3Waveform => self.lfos[2].waveform.index() as f32,
        }
    }

    /// Write a parameter by id, clamping into its range
    pub fn set(&mut self, id: ParameterId, value: f32) {
        let value = id.clamp(value);
        let waveform = LfoWaveform::from_index(value.round() as i32);

        match id {
            ParameterId::MasterVolume => self.master_volume = value,
            ParameterId::EnvAttack => self.envelope.attack = value,
            ParameterId::EnvDecay => self.envelope.decay = value,
            ParameterId::EnvSustain => self.envelope.sustain = value,
            ParameterId::EnvRelease => self.envelope.release = value,
            ParameterId::FilterCutoff => self.filter.cutoff = value,
            ParameterId::FilterResonance => self.filter.resonance = value,
            ParameterId::Lfo1Rate => self.lfos[0].rate = value,
            ParameterId::Lfo1Amount => self.lfos[0].amount = value,
            ParameterId::Lfo1Waveform => self.lfos[0].waveform = waveform,
            ParameterId::Lfo2Rate => self.lfos[1].rate = value,
            ParameterId::Lfo2Amount => self.lfos[1].amount = value,
            ParameterId::Lfo2Waveform => self.lfos[1].waveform = waveform,
            ParameterId::Lfo3Rate => self.lfos[2].rate = value,
            ParameterId::Lfo3Amount => self.lfos[2].amount = value,
            ParameterId::Lfo3Waveform => self.lfos[2].waveform = waveform,
        }
    }

    /// Flat `id -> value` mapping
    pub fn to_map(&self) -> BTreeMap<String, f32> {
        ParameterId::ALL
            .iter()
            .map(|&id| (id.name().to_string(), self.get(id)))
            .collect()
    }

    /// Apply a flat mapping; unknown ids are skipped
    pub fn apply_map(&mut self, values: &BTreeMap<String, f32>) {
        for (name, &value) in values {
            match name.parse::<ParameterId>() {
                Ok(id) => self.set(id, value),
                Err(e) => warn!("ignoring saved value: {}", e),
            }
        }
    }

    /// Check that every value lies within its range
    pub fn out_of_range(&self) -> Option<(ParameterId, f32)> {
        ParameterId::ALL.iter().copied().find_map(|id| {
            let (min, max) = id.range();
            let value = self.get(id);
            (!(min..=max).contains(&value)).then_some((id, value))
        })
    }
}

/// Parse an `id=value` assignment
pub fn parse_assignment(text: &str) -> anyhow::Result<(ParameterId, f32)> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected id=value, got '{}'", text))?;
    let id: ParameterId = name.trim().parse()?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid value for {}: '{}'", id, value.trim()))?;
    Ok((id, value))
}

/// Parameter table shared between a control thread and the audio thread.
///
/// One writer and one reader; each value is an independent atomic.
pub struct SharedParameters {
    values: [AtomicU32; ParameterId::COUNT],
}

impl SharedParameters {
    pub fn new(initial: &Parameters) -> Self {
        let shared = Self {
            values: std::array::from_fn(|_| AtomicU32::new(0)),
        };
        shared.store_all(initial);
        shared
    }

    /// Write one value (clamped)
    pub fn set(&self, id: ParameterId, value: f32) {
        self.values[id.index()].store(id.clamp(value).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, id: ParameterId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    /// Overwrite every value from a snapshot
    pub fn store_all(&self, params: &Parameters) {
        for id in ParameterId::ALL {
            self.set(id, params.get(id));
        }
    }

    /// Copy the current values into a snapshot
    pub fn snapshot(&self) -> Parameters {
        let mut params = Parameters::default();
        for id in ParameterId::ALL {
            params.set(id, self.get(id));
        }
        params
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(&Parameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = Parameters::default();
        assert_eq!(params.master_volume, 0.7);
        assert_eq!(params.envelope.sustain, 0.8);
        assert_eq!(params.filter.cutoff, 1000.0);
        assert_eq!(params.lfos[2].rate, 1.0);
        assert_eq!(params.lfos[2].amount, 0.0);
        assert!(params.out_of_range().is_none());
    }

    #[test]
    fn test_parameter_names_round_trip() {
        for id in ParameterId::ALL {
            assert_eq!(id.name().parse::<ParameterId>().unwrap(), id);
        }
        assert!("lfo4_rate".parse::<ParameterId>().is_err());
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut params = Parameters::default();
        params.set(ParameterId::FilterCutoff, 50_000.0);
        params.set(ParameterId::EnvRelease, -1.0);
        params.set(ParameterId::Lfo2Waveform, 7.0);

        assert_eq!(params.filter.cutoff, 20_000.0);
        assert_eq!(params.envelope.release, 0.0);
        assert_eq!(params.lfos[1].waveform, LfoWaveform::Random);
    }

    #[test]
    fn test_map_round_trip() {
        let mut params = Parameters::default();
        params.set(ParameterId::Lfo1Amount, 0.4);
        params.set(ParameterId::Lfo3Waveform, 3.0);
        params.set(ParameterId::EnvAttack, 1.25);

        let map = params.to_map();
        assert_eq!(map.len(), ParameterId::COUNT);
        assert_eq!(map["lfo3_waveform"], 3.0);

        let mut restored = Parameters::default();
        restored.apply_map(&map);
        assert_eq!(restored, params);
    }

    #[test]
    fn test_apply_map_skips_unknown() {
        let mut values = BTreeMap::new();
        values.insert("master_volume".to_string(), 0.2);
        values.insert("bogus".to_string(), 1.0);

        let mut params = Parameters::default();
        params.apply_map(&values);
        assert_eq!(params.master_volume, 0.2);
    }

    #[test]
    fn test_parse_assignment() {
        let (id, value) = parse_assignment("filter_cutoff=2500").unwrap();
        assert_eq!(id, ParameterId::FilterCutoff);
        assert_eq!(value, 2500.0);

        assert!(parse_assignment("filter_cutoff").is_err());
        assert!(parse_assignment("nope=1").is_err());
        assert!(parse_assignment("env_decay=fast").is_err());
    }

    #[test]
    fn test_shared_parameters_snapshot() {
        let shared = SharedParameters::default();
        shared.set(ParameterId::FilterResonance, 4.0);
        shared.set(ParameterId::MasterVolume, 3.0);

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.filter.resonance, 4.0);
        assert_eq!(snapshot.master_volume, 1.0);
        assert_eq!(snapshot.envelope, EnvelopeParameters::default());
    }

    #[test]
    fn test_parameters_yaml_defaults() {
        let yaml = r#"
master_volume: 0.5
filter:
  cutoff: 4000
lfos:
  - { rate: 2.0, amount: 0.5, waveform: triangle }
  - {}
  - { waveform: random }
"#;
        let params: Parameters = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.master_volume, 0.5);
        assert_eq!(params.filter.cutoff, 4000.0);
        assert_eq!(params.filter.resonance, 1.0);
        assert_eq!(params.lfos[0].waveform, LfoWaveform::Triangle);
        assert_eq!(params.lfos[1], LfoParameters::default());
        assert_eq!(params.lfos[2].waveform, LfoWaveform::Random);
        assert_eq!(params.envelope, EnvelopeParameters::default());
    }
}
