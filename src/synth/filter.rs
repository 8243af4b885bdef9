//! Resonant low-pass filter
//!
//! Topology-preserving-transform state-variable filter, run on both
//! channels of the mixed voice output.

use std::f32::consts::PI;

use crate::buffer::StereoBuffer;
use crate::params::FilterParameters;

use super::modulation::{ModulationDestination, ModulationMatrix};

/// Lowest and highest cutoff the modulated cutoff may reach
pub const MIN_CUTOFF_HZ: f32 = 20.0;
pub const MAX_CUTOFF_HZ: f32 = 20_000.0;

/// Integrator memories for one channel
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    ic1eq: f32,
    ic2eq: f32,
}

/// Two-channel state-variable low-pass filter
pub struct Filter {
    sample_rate: f32,
    cutoff: f32,
    resonance: f32,

    // Coefficients
    g: f32,
    k: f32,
    h: f32,

    state: [ChannelState; 2],
}

impl Filter {
    /// Create a new low-pass filter
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            sample_rate: sample_rate.max(1.0),
            cutoff: 1000.0,
            resonance: 1.0,
            g: 0.0,
            k: 0.0,
            h: 0.0,
            state: [ChannelState::default(); 2],
        };
        filter.calculate_coefficients();
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.calculate_coefficients();
    }

    /// Set cutoff frequency in Hz
    pub fn set_cutoff(&mut self, hz: f32) {
        // Stay below Nyquist so the prewarp stays finite
        self.cutoff = hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ.min(self.sample_rate * 0.49));
        self.calculate_coefficients();
    }

    /// Get cutoff frequency
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Set resonance (Q). 0.707 is flat; higher values peak at the cutoff.
    pub fn set_resonance(&mut self, q: f32) {
        self.resonance = q.clamp(0.1, 10.0);
        self.calculate_coefficients();
    }

    /// Get resonance
    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// Reset filter state (clear history)
    pub fn reset(&mut self) {
        self.state = [ChannelState::default(); 2];
    }

    fn calculate_coefficients(&mut self) {
        self.g = (PI * self.cutoff / self.sample_rate).tan();
        self.k = 1.0 / self.resonance;
        self.h = 1.0 / (1.0 + self.g * (self.g + self.k));
    }

    /// Process a single sample on `channel` (0 = left, 1 = right)
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        let Some(state) = self.state.get_mut(channel) else {
            return input;
        };

        let v3 = input - state.ic2eq;
        let v1 = self.h * (state.ic1eq + self.g * v3);
        let v2 = state.ic2eq + self.g * v1;

        state.ic1eq = 2.0 * v1 - state.ic1eq;
        state.ic2eq = 2.0 * v2 - state.ic2eq;

        v2
    }

    /// Process a buffer of samples in place
    pub fn process_buffer(&mut self, buffer: &mut StereoBuffer) {
        for (channel, samples) in buffer.channels_mut().into_iter().enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process(channel, *sample);
            }
        }
    }
}

/// Cutoff after percentage modulation, clamped to the audible range
pub fn modulated_cutoff(cutoff: f32, modulation: f32) -> f32 {
    (cutoff + cutoff * modulation).clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ)
}

/// Post-mix filter driven by parameters and, optionally, the modulation matrix
pub struct FilterStage {
    filter: Filter,
}

impl FilterStage {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            filter: Filter::new(sample_rate),
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.filter.set_sample_rate(sample_rate);
        self.filter.reset();
    }

    /// Filter the mixed block in place
    pub fn process_block(
        &mut self,
        buffer: &mut StereoBuffer,
        params: &FilterParameters,
        modulation: Option<&ModulationMatrix>,
    ) {
        let cutoff = match modulation {
            Some(matrix) => modulated_cutoff(
                params.cutoff,
                matrix.modulation(ModulationDestination::FilterCutoff),
            ),
            None => params.cutoff,
        };

        self.filter.set_cutoff(cutoff);
        self.filter.set_resonance(params.resonance);
        self.filter.process_buffer(buffer);
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{LfoParameters, Parameters};
    use crate::synth::LfoWaveform;

    fn sine_buffer(freq: f32, sample_rate: f32, frames: usize) -> StereoBuffer {
        let mut buffer = StereoBuffer::new(frames);
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f32 / sample_rate).sin();
            buffer.add(i, s, s);
        }
        buffer
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_filter_creation() {
        let filter = Filter::new(44100.0);
        assert_eq!(filter.cutoff(), 1000.0);
        assert_eq!(filter.resonance(), 1.0);
    }

    #[test]
    fn test_filter_cutoff_clamping() {
        let mut filter = Filter::new(44100.0);

        filter.set_cutoff(5.0);
        assert_eq!(filter.cutoff(), 20.0);

        filter.set_cutoff(25000.0);
        assert!(filter.cutoff() < 44100.0 * 0.5);
    }

    #[test]
    fn test_filter_resonance_clamping() {
        let mut filter = Filter::new(44100.0);

        filter.set_resonance(0.01);
        assert_eq!(filter.resonance(), 0.1);

        filter.set_resonance(100.0);
        assert_eq!(filter.resonance(), 10.0);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let mut filter = Filter::new(44100.0);
        filter.set_cutoff(100.0);
        filter.set_resonance(0.707);

        let mut buffer = sine_buffer(5000.0, 44100.0, 2000);
        filter.process_buffer(&mut buffer);

        let out = rms(&buffer.left()[500..]);
        assert!(out < 0.01, "expected attenuation, got rms={}", out);
    }

    #[test]
    fn test_lowpass_passes_low_frequencies() {
        let mut filter = Filter::new(44100.0);
        filter.set_cutoff(5000.0);
        filter.set_resonance(0.707);

        let input = sine_buffer(100.0, 44100.0, 4410);
        let mut buffer = input.clone();
        filter.process_buffer(&mut buffer);

        let ratio = rms(&buffer.right()[100..]) / rms(&input.right()[100..]);
        assert!(ratio > 0.9, "expected passthrough, got ratio={}", ratio);
    }

    #[test]
    fn test_dc_settles_to_unity() {
        let mut filter = Filter::new(48000.0);
        filter.set_cutoff(500.0);

        let mut out = 0.0;
        for _ in 0..2048 {
            out = filter.process(0, 1.0);
        }
        assert!((out - 1.0).abs() < 0.01, "dc gain = {}", out);
    }

    #[test]
    fn test_filter_reset() {
        let mut filter = Filter::new(44100.0);

        for _ in 0..100 {
            filter.process(0, 1.0);
        }

        filter.reset();

        let output = filter.process(0, 0.0);
        assert!(output.abs() < 0.001, "expected silence after reset, got {}", output);
    }

    #[test]
    fn test_modulated_cutoff_is_percentage() {
        assert_eq!(modulated_cutoff(1000.0, 0.5), 1500.0);
        assert_eq!(modulated_cutoff(1000.0, -0.5), 500.0);
        assert_eq!(modulated_cutoff(15000.0, 0.5), 20000.0);
        assert_eq!(modulated_cutoff(30.0, -0.5), 20.0);
    }

    #[test]
    fn test_stage_uses_matrix_when_attached() {
        let mut params = Parameters::default();
        params.lfos[0] = LfoParameters {
            rate: 1.0,
            amount: 1.0,
            waveform: LfoWaveform::Square,
        };
        let mut matrix = ModulationMatrix::new(48000.0);
        matrix.process_block(16, &params);

        let mut stage = FilterStage::new(48000.0);
        let mut buffer = StereoBuffer::new(16);

        stage.process_block(&mut buffer, &params.filter, Some(&matrix));
        assert_eq!(stage.filter().cutoff(), 1500.0);

        stage.process_block(&mut buffer, &params.filter, None);
        assert_eq!(stage.filter().cutoff(), 1000.0);
    }
}
