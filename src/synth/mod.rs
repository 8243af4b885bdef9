//! Synthesis building blocks
//!
//! LFOs and the modulation matrix, envelopes, the output filter and the
//! sample playback voice.

mod envelope;
mod filter;
mod lfo;
mod modulation;
mod voice;

pub use envelope::{Envelope, EnvelopeStage};
pub use filter::{modulated_cutoff, Filter, FilterStage, MAX_CUTOFF_HZ, MIN_CUTOFF_HZ};
pub use lfo::{Lfo, LfoWaveform};
pub use modulation::{ModulationDestination, ModulationMatrix, ModulationSource};
pub use voice::{RenderContext, Voice};
