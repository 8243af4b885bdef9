//! Sampler engine
//!
//! Block orchestration: modulation, event dispatch, voice rendering, the
//! output filter, master gain and metering, in that order, once per block.

mod bounce;
mod events;
mod midi;
mod player;
mod pool;
mod recorder;
mod telemetry;

pub use bounce::{bounce_to_file, render_notes, BouncePlan, BounceReport};
pub use events::{
    controller_parameter, controller_value, pitch_bend_octaves, EventSource, SamplerEvent,
    CC_MOD_WHEEL, PITCH_BEND_CENTER,
};
pub use midi::{list_midi_inputs, MidiListener};
pub use player::{list_output_devices, Player};
pub use pool::{StealPolicy, VoicePool};
pub use recorder::Recorder;
pub use telemetry::{load_percent, LoadMeter, Telemetry, TelemetrySnapshot, MAX_VOICES};

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::buffer::StereoBuffer;
use crate::config::SamplerConfig;
use crate::params::{ParameterId, Parameters};
use crate::sample::{DecodedAudio, Decoder, SampleStore};
use crate::state::{SampleState, SamplerState};
use crate::synth::{
    FilterStage, ModulationDestination, ModulationMatrix, ModulationSource, RenderContext, Voice,
};

/// The polyphonic sampler
pub struct Sampler {
    sample_rate: f64,
    block_size: usize,
    parameters: Parameters,
    store: SampleStore,
    pool: VoicePool,
    modulation: ModulationMatrix,
    filter: FilterStage,
    telemetry: Arc<Telemetry>,
    load_meter: LoadMeter,
}

impl Sampler {
    /// Create a sampler with full polyphony and oldest-first stealing
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        Self::with_voices(sample_rate, block_size, MAX_VOICES, StealPolicy::default())
    }

    pub fn with_voices(
        sample_rate: f64,
        block_size: usize,
        polyphony: usize,
        policy: StealPolicy,
    ) -> Self {
        let sample_rate = sample_rate.max(1.0);
        Self {
            sample_rate,
            block_size: block_size.max(1),
            parameters: Parameters::default(),
            store: SampleStore::new(),
            pool: VoicePool::new(polyphony, sample_rate, policy),
            modulation: ModulationMatrix::new(sample_rate),
            filter: FilterStage::new(sample_rate as f32),
            telemetry: Arc::new(Telemetry::new()),
            load_meter: LoadMeter::new(sample_rate),
        }
    }

    /// Build a sampler from a patch, decoding every sample it lists.
    ///
    /// Samples that fail to decode are skipped.
    pub fn from_config(config: &SamplerConfig, decoder: &dyn Decoder) -> Self {
        let mut sampler = Self::with_voices(
            f64::from(config.audio.sample_rate),
            config.audio.buffer_size,
            config.engine.polyphony,
            config.engine.steal_policy,
        );
        sampler.parameters = config.parameters;

        for entry in &config.samples {
            let Some(index) = sampler.store.load_file(decoder, &entry.path, entry.root_note) else {
                continue;
            };
            if let Some(sample) = sampler.store.get_mut(index) {
                if let Some(name) = &entry.name {
                    sample.name = name.clone();
                }
                sample.set_note_range(entry.note_range);
                sample.set_loop_settings(entry.loop_settings);
            }
        }

        info!(
            "sampler ready: {} of {} samples loaded, {} voices at {} Hz",
            sampler.store.len(),
            config.samples.len(),
            sampler.pool.polyphony(),
            sampler.sample_rate
        );
        sampler
    }

    /// Reset for a new sample rate and block size
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        self.sample_rate = sample_rate.max(1.0);
        self.block_size = block_size.max(1);
        self.modulation.prepare(self.sample_rate);
        self.filter.prepare(self.sample_rate as f32);
        self.pool.set_sample_rate(self.sample_rate);
        self.pool.kill_all(&self.telemetry);
        self.load_meter.set_sample_rate(self.sample_rate);
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Largest block `process_block` is expected to see
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Replace the parameter snapshot used from the next block on
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    pub fn set_parameter(&mut self, id: ParameterId, value: f32) {
        self.parameters.set(id, value);
    }

    pub fn samples(&self) -> &SampleStore {
        &self.store
    }

    /// Direct store access, for use while no audio thread owns the sampler
    pub fn samples_mut(&mut self) -> &mut SampleStore {
        &mut self.store
    }

    pub fn load_sample(&mut self, audio: DecodedAudio, root_note: u8) -> usize {
        self.store.load_sample(audio, root_note)
    }

    pub fn load_file(&mut self, decoder: &dyn Decoder, path: &Path, root_note: u8) -> Option<usize> {
        self.store.load_file(decoder, path, root_note)
    }

    /// Shared meter values
    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn voices(&self) -> &[Voice] {
        self.pool.voices()
    }

    pub fn modulation(&self) -> &ModulationMatrix {
        &self.modulation
    }

    /// Apply one event immediately
    pub fn handle_event(&mut self, event: SamplerEvent) {
        match event {
            SamplerEvent::NoteOn { note, velocity } => {
                self.pool.note_on(
                    note,
                    f32::from(velocity) / 127.0,
                    &self.store,
                    &mut self.modulation,
                    &self.parameters.envelope,
                    &self.telemetry,
                );
            }
            SamplerEvent::NoteOff { note } => self.pool.note_off(note, &self.telemetry),
            SamplerEvent::PitchBend { value } => self
                .modulation
                .set_source(ModulationSource::PitchBend, pitch_bend_octaves(value)),
            SamplerEvent::Controller { number, value } => {
                if number == CC_MOD_WHEEL {
                    self.modulation
                        .set_source(ModulationSource::ModWheel, f32::from(value) / 127.0);
                }
            }
            SamplerEvent::Aftertouch { value } => self
                .modulation
                .set_source(ModulationSource::Aftertouch, f32::from(value) / 127.0),
            SamplerEvent::AllNotesOff => self.pool.all_notes_off(&self.telemetry),
            SamplerEvent::SetLoop { sample, settings } => {
                if let Some(sample) = self.store.get_mut(sample) {
                    sample.set_loop_settings(settings);
                }
            }
            SamplerEvent::SetNoteRange { sample, range } => {
                if let Some(sample) = self.store.get_mut(sample) {
                    sample.set_note_range(range);
                }
            }
        }
    }

    /// Render one block into `out`, which is overwritten
    pub fn process_block(&mut self, out: &mut StereoBuffer, events: &mut dyn EventSource) {
        self.load_meter.begin();
        let frames = out.len();

        self.modulation.process_block(frames, &self.parameters);

        while let Some(event) = events.pop() {
            self.handle_event(event);
        }

        out.clear();
        let ctx = RenderContext {
            samples: &self.store,
            modulation: &self.modulation,
            telemetry: self.telemetry.as_ref(),
        };
        self.pool.render(out, 0, frames, &ctx);

        self.filter
            .process_block(out, &self.parameters.filter, Some(&self.modulation));

        let tremolo = (1.0 + self.modulation.modulation(ModulationDestination::Volume)).max(0.0);
        out.apply_gain(self.parameters.master_volume * tremolo);

        self.telemetry.set_active_voices(self.pool.active_count());
        let load = self.load_meter.end(frames);
        self.telemetry.set_cpu_load(load);
    }

    /// Capture parameters and the metadata of every file-backed sample
    pub fn export_state(&self) -> SamplerState {
        let samples: Vec<SampleState> = self
            .store
            .samples()
            .iter()
            .filter_map(SampleState::capture)
            .collect();

        if samples.len() < self.store.len() {
            debug!(
                "{} in-memory samples left out of saved state",
                self.store.len() - samples.len()
            );
        }

        SamplerState {
            parameters: Some(self.parameters.to_map()),
            samples: Some(samples),
        }
    }

    /// Replace parameters and samples with saved state.
    ///
    /// Each section is applied only when present. Samples are reloaded
    /// through `decoder`; files that are missing or fail to decode are
    /// skipped. Returns the number of samples restored.
    pub fn import_state(&mut self, state: &SamplerState, decoder: &dyn Decoder) -> usize {
        if let Some(values) = &state.parameters {
            let mut parameters = Parameters::default();
            parameters.apply_map(values);
            self.parameters = parameters;
        }

        let Some(saved_samples) = &state.samples else {
            debug!("no sample section, keeping {} loaded samples", self.store.len());
            return 0;
        };

        self.pool.kill_all(&self.telemetry);
        self.store.clear();

        for saved in saved_samples {
            let Some(index) = self.store.load_file(decoder, &saved.path, saved.root_note) else {
                continue;
            };
            if let Some(sample) = self.store.get_mut(index) {
                saved.apply(sample);
            }
        }

        let restored = self.store.len();
        if restored < saved_samples.len() {
            warn!(
                "restored {} of {} samples, {} skipped",
                restored,
                saved_samples.len(),
                saved_samples.len() - restored
            );
        } else {
            info!("restored {} samples", restored);
        }
        restored
    }

    /// Restore from serialized state.
    ///
    /// Malformed data, or state with neither section, leaves the sampler
    /// untouched and returns false.
    pub fn restore_from_bytes(&mut self, bytes: &[u8], decoder: &dyn Decoder) -> bool {
        match SamplerState::from_json(bytes) {
            Ok(state) if state.is_empty() => {
                warn!("ignoring saved state: no parameters or samples");
                false
            }
            Ok(state) => {
                self.import_state(&state, decoder);
                true
            }
            Err(e) => {
                warn!("ignoring saved state: {}", e);
                false
            }
        }
    }
}
