//! ADSR envelope generator
//!
//! Attack-Decay-Sustain-Release envelope for amplitude shaping.

use crate::params::EnvelopeParameters;

/// Shortest stage time, so a zero-length stage still takes a sample
const MIN_STAGE_SECONDS: f32 = 0.001;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope generator
pub struct Envelope {
    sample_rate: f32,

    // Time parameters (in seconds)
    attack: f32,
    decay: f32,
    sustain: f32, // Level (0.0-1.0)
    release: f32,

    // State
    stage: EnvelopeStage,
    level: f32,
    release_start_level: f32,
}

impl Envelope {
    /// Create a new envelope with default parameters
    pub fn new(sample_rate: f32) -> Self {
        let defaults = EnvelopeParameters::default();
        let mut envelope = Self {
            sample_rate: sample_rate.max(1.0),
            attack: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            release_start_level: 0.0,
        };
        envelope.configure(&defaults);
        envelope
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Set attack time in seconds
    pub fn set_attack(&mut self, seconds: f32) {
        self.attack = seconds.max(MIN_STAGE_SECONDS);
    }

    /// Set decay time in seconds
    pub fn set_decay(&mut self, seconds: f32) {
        self.decay = seconds.max(MIN_STAGE_SECONDS);
    }

    /// Set sustain level (0.0-1.0)
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.clamp(0.0, 1.0);
    }

    /// Set release time in seconds
    pub fn set_release(&mut self, seconds: f32) {
        self.release = seconds.max(MIN_STAGE_SECONDS);
    }

    /// Configure all ADSR parameters at once
    pub fn configure(&mut self, params: &EnvelopeParameters) {
        self.set_attack(params.attack);
        self.set_decay(params.decay);
        self.set_sustain(params.sustain);
        self.set_release(params.release);
    }

    /// Start (or restart) the attack phase from the current level
    pub fn note_on(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Move any sounding stage into release
    pub fn note_off(&mut self) {
        if self.stage != EnvelopeStage::Idle && self.stage != EnvelopeStage::Release {
            self.release_start_level = self.level;
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Reset envelope to idle state
    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_start_level = 0.0;
    }

    /// Get current stage
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Check if envelope is active (not idle)
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    /// Generate the next envelope sample
    pub fn next_sample(&mut self) -> f32 {
        let dt = 1.0 / self.sample_rate;

        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                // Linear attack from current level to 1.0
                self.level += dt / self.attack;

                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                // Linear decay from 1.0 to sustain level
                let target = self.sustain;
                self.level -= (1.0 - target) / self.decay * dt;

                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.sustain;
            }

            EnvelopeStage::Release => {
                // Linear release from release_start_level to 0.0
                self.level -= self.release_start_level / self.release * dt;

                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }

    /// Get current level without advancing
    pub fn level(&self) -> f32 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(attack: f32, decay: f32, sustain: f32, release: f32) -> EnvelopeParameters {
        EnvelopeParameters {
            attack,
            decay,
            sustain,
            release,
        }
    }

    #[test]
    fn test_envelope_creation() {
        let env = Envelope::new(44100.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
        assert!(!env.is_active());
    }

    #[test]
    fn test_envelope_note_on() {
        let mut env = Envelope::new(44100.0);
        env.note_on();

        assert_eq!(env.stage(), EnvelopeStage::Attack);
        assert!(env.is_active());
    }

    #[test]
    fn test_double_note_on_is_single_retrigger() {
        let mut env = Envelope::new(44100.0);
        env.configure(&params(0.01, 0.1, 0.5, 0.1));
        env.note_on();
        for _ in 0..100 {
            env.next_sample();
        }
        let level = env.level();

        env.note_on();
        env.note_on();
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        // Retrigger continues from where the level was
        assert_eq!(env.level(), level);
    }

    #[test]
    fn test_note_on_during_release_restarts_attack() {
        let mut env = Envelope::new(1000.0);
        env.configure(&params(0.001, 0.001, 0.5, 1.0));
        env.note_on();
        for _ in 0..10 {
            env.next_sample();
        }
        env.note_off();
        assert_eq!(env.stage(), EnvelopeStage::Release);

        env.note_on();
        assert_eq!(env.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_envelope_attack_phase() {
        let mut env = Envelope::new(44100.0);
        env.set_attack(0.01); // 10ms attack
        env.note_on();

        // 441 samples for 10ms at 44100 Hz
        for _ in 0..500 {
            env.next_sample();
        }

        assert!(env.level() > 0.9);
    }

    #[test]
    fn test_envelope_sustain_level() {
        let mut env = Envelope::new(44100.0);
        env.configure(&params(0.001, 0.001, 0.5, 0.001));
        env.note_on();

        for _ in 0..500 {
            env.next_sample();
        }

        assert!((env.level() - 0.5).abs() < 0.01);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_release_completes_after_release_time() {
        // Sustain at 1.0 and a 100ms release at 1 kHz: 100 samples of tail
        let mut env = Envelope::new(1000.0);
        env.configure(&params(0.001, 0.001, 1.0, 0.1));
        env.note_on();
        for _ in 0..10 {
            env.next_sample();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.note_off();
        for _ in 0..95 {
            env.next_sample();
        }
        assert!(env.is_active(), "released too early");

        for _ in 0..10 {
            env.next_sample();
        }
        assert!(!env.is_active());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_note_off_when_idle_stays_idle() {
        let mut env = Envelope::new(44100.0);
        env.note_off();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.next_sample(), 0.0);
    }

    #[test]
    fn test_zero_times_still_progress() {
        let mut env = Envelope::new(44100.0);
        env.configure(&params(0.0, 0.0, 0.3, 0.0));
        env.note_on();

        for _ in 0..200 {
            env.next_sample();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.note_off();
        for _ in 0..200 {
            env.next_sample();
        }
        assert!(!env.is_active());
    }

    #[test]
    fn test_envelope_reset() {
        let mut env = Envelope::new(44100.0);
        env.note_on();

        for _ in 0..100 {
            env.next_sample();
        }

        env.reset();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }
}
