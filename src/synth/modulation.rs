//! Modulation matrix
//!
//! Owns the LFO bank and turns LFO output and performance inputs into
//! per-destination modulation amounts. Computed once per block; voices and
//! the filter only read the result.

use crate::params::{Parameters, LFO_COUNT};

use super::lfo::Lfo;

/// Depth of LFO1 on filter cutoff (fraction of the base cutoff)
const FILTER_CUTOFF_DEPTH: f32 = 0.5;
/// Depth of LFO2 on pitch (octaves)
const PITCH_DEPTH: f32 = 0.1;
/// Depth of LFO3 on volume (fraction of the master gain)
const VOLUME_DEPTH: f32 = 0.3;

/// Values that can drive modulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationSource {
    Lfo1,
    Lfo2,
    Lfo3,
    Envelope,
    ModWheel,
    Velocity,
    KeyTrack,
    /// Pitch wheel position in octaves
    PitchBend,
    Aftertouch,
}

impl ModulationSource {
    pub const COUNT: usize = 9;

    /// Source for the LFO at `index` (0-based)
    pub fn lfo(index: usize) -> Self {
        match index {
            0 => ModulationSource::Lfo1,
            1 => ModulationSource::Lfo2,
            _ => ModulationSource::Lfo3,
        }
    }
}

/// Parameters that can be modulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationDestination {
    Volume,
    Pan,
    Pitch,
    FilterCutoff,
    FilterResonance,
    SampleStart,
    LoopStart,
    LoopEnd,
}

impl ModulationDestination {
    pub const COUNT: usize = 8;
}

/// Block-rate modulation routing
pub struct ModulationMatrix {
    lfos: [Lfo; LFO_COUNT],
    sources: [f32; ModulationSource::COUNT],
    destinations: [f32; ModulationDestination::COUNT],
}

impl ModulationMatrix {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            lfos: std::array::from_fn(|i| Lfo::with_seed(sample_rate, 0x1F0 + i as u64)),
            sources: [0.0; ModulationSource::COUNT],
            destinations: [0.0; ModulationDestination::COUNT],
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(sample_rate);
            lfo.reset();
        }
    }

    /// Advance the LFOs by one block and recompute every destination.
    ///
    /// Must run once per block before any voice renders it. Only the last
    /// LFO value of the block is kept.
    pub fn process_block(&mut self, num_samples: usize, params: &Parameters) {
        for (lfo, lfo_params) in self.lfos.iter_mut().zip(&params.lfos) {
            lfo.set_frequency(f64::from(lfo_params.rate));
            lfo.set_waveform(lfo_params.waveform);
        }

        for _ in 0..num_samples {
            for (index, lfo) in self.lfos.iter_mut().enumerate() {
                self.sources[ModulationSource::lfo(index) as usize] = lfo.process();
            }
        }

        let scaled = |index: usize| {
            self.sources[ModulationSource::lfo(index) as usize] * params.lfos[index].amount
        };
        let filter_cutoff = scaled(0) * FILTER_CUTOFF_DEPTH;
        let pitch = scaled(1) * PITCH_DEPTH;
        let volume = scaled(2) * VOLUME_DEPTH;

        self.destinations = [0.0; ModulationDestination::COUNT];
        self.destinations[ModulationDestination::FilterCutoff as usize] = filter_cutoff;
        self.destinations[ModulationDestination::Pitch as usize] = pitch;
        self.destinations[ModulationDestination::Volume as usize] = volume;
    }

    /// Current modulation amount for a destination (0 when unrouted)
    pub fn modulation(&self, destination: ModulationDestination) -> f32 {
        self.destinations[destination as usize]
    }

    /// Push an instantaneous source value
    pub fn set_source(&mut self, source: ModulationSource, value: f32) {
        self.sources[source as usize] = value;
    }

    pub fn source(&self, source: ModulationSource) -> f32 {
        self.sources[source as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::LfoWaveform;

    #[test]
    fn test_unrouted_destinations_read_zero() {
        let mut matrix = ModulationMatrix::new(48000.0);
        matrix.process_block(256, &Parameters::default());

        assert_eq!(matrix.modulation(ModulationDestination::Pan), 0.0);
        assert_eq!(matrix.modulation(ModulationDestination::LoopEnd), 0.0);
        // Amounts default to zero, so routed destinations are neutral too
        assert_eq!(matrix.modulation(ModulationDestination::Pitch), 0.0);
    }

    #[test]
    fn test_destination_scaling() {
        // Square LFOs start at +1 and stay there for the first half cycle
        let mut params = Parameters::default();
        for lfo in &mut params.lfos {
            lfo.waveform = LfoWaveform::Square;
            lfo.rate = 1.0;
            lfo.amount = 1.0;
        }
        params.lfos[1].amount = 0.5;

        let mut matrix = ModulationMatrix::new(1000.0);
        matrix.process_block(10, &params);

        assert_eq!(matrix.source(ModulationSource::Lfo1), 1.0);
        assert_eq!(matrix.modulation(ModulationDestination::FilterCutoff), 0.5);
        assert!((matrix.modulation(ModulationDestination::Pitch) - 0.05).abs() < 1e-6);
        assert!((matrix.modulation(ModulationDestination::Volume) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_block_keeps_last_lfo_value() {
        let mut params = Parameters::default();
        params.lfos[0].waveform = LfoWaveform::Square;
        params.lfos[0].rate = 1.0;
        params.lfos[0].amount = 1.0;

        // 1000 Hz: samples 0..500 are +1, 500..1000 are -1
        let mut matrix = ModulationMatrix::new(1000.0);
        matrix.process_block(600, &params);
        assert_eq!(matrix.source(ModulationSource::Lfo1), -1.0);
        assert_eq!(matrix.modulation(ModulationDestination::FilterCutoff), -0.5);
    }

    #[test]
    fn test_source_values_read_back() {
        let mut matrix = ModulationMatrix::new(44100.0);
        matrix.set_source(ModulationSource::Velocity, 0.8);
        matrix.set_source(ModulationSource::KeyTrack, 60.0 / 127.0);

        matrix.process_block(64, &Parameters::default());

        assert_eq!(matrix.source(ModulationSource::Velocity), 0.8);
        assert_eq!(matrix.source(ModulationSource::KeyTrack), 60.0 / 127.0);
        assert_eq!(matrix.source(ModulationSource::PitchBend), 0.0);
    }
}
