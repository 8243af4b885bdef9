//! Sampler - polyphonic sample playback
//!
//! Plays recorded samples across the keyboard with per-voice ADSR, three
//! loop modes, an LFO modulation matrix and a resonant output filter.

pub mod buffer;
pub mod config;
pub mod engine;
pub mod params;
pub mod sample;
pub mod state;
pub mod synth;

pub use buffer::StereoBuffer;
pub use config::SamplerConfig;
pub use engine::Sampler;
pub use params::{ParameterId, Parameters};
