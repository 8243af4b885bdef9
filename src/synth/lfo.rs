//! Low Frequency Oscillator for modulation
//!
//! Phase-accumulator oscillator with five shapes, stepped at the audio
//! sample rate by the modulation matrix.

use std::f64::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// LFO waveform shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LfoWaveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    /// Sample-and-hold: a new random value at every cycle
    Random,
}

impl LfoWaveform {
    pub const ALL: [LfoWaveform; 5] = [
        LfoWaveform::Sine,
        LfoWaveform::Triangle,
        LfoWaveform::Square,
        LfoWaveform::Sawtooth,
        LfoWaveform::Random,
    ];

    /// Shape for a choice index; out-of-range indices clamp to [0, 4]
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.clamp(0, Self::ALL.len() as i32 - 1) as usize]
    }

    /// Choice index of this shape
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Low Frequency Oscillator
pub struct Lfo {
    waveform: LfoWaveform,
    frequency: f64,
    phase: f64,
    sample_rate: f64,
    /// Current sample-and-hold value
    held: f32,
    rng: SmallRng,
}

impl Lfo {
    /// Create a new LFO
    pub fn new(sample_rate: f64) -> Self {
        Self::with_seed(sample_rate, 0x5A3D_1F0C)
    }

    /// Create a new LFO whose sample-and-hold sequence starts from `seed`
    pub fn with_seed(sample_rate: f64, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let held = rng.gen_range(-1.0..=1.0);

        Self {
            waveform: LfoWaveform::Sine,
            frequency: 1.0,
            phase: 0.0,
            sample_rate: sample_rate.max(1.0),
            held,
            rng,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Set LFO frequency in Hz
    pub fn set_frequency(&mut self, hz: f64) {
        self.frequency = hz.max(0.0);
    }

    /// Get LFO frequency
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    /// Current phase in [0, 1)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Reset phase
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Generate the next sample in [-1.0, 1.0]
    pub fn process(&mut self) -> f32 {
        let phase = self.phase;
        let raw = match self.waveform {
            LfoWaveform::Sine => (phase * 2.0 * PI).sin(),
            LfoWaveform::Triangle => 2.0 * (2.0 * (phase - (phase + 0.5).floor())).abs() - 1.0,
            LfoWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::Sawtooth => 2.0 * (phase - (phase + 0.5).floor()),
            LfoWaveform::Random => f64::from(self.held),
        };

        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
            self.held = self.rng.gen_range(-1.0..=1.0);
        }

        raw as f32
    }
}
