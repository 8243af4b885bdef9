//! Metering shared with non-realtime readers
//!
//! The audio thread is the only writer. Readers (a UI, the CLI meter) load
//! the values whenever they like; every slot is an independent atomic.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Instant;

/// Maximum polyphony, and the number of per-voice meter slots
pub const MAX_VOICES: usize = 16;

/// Lock-free meter values
pub struct Telemetry {
    positions: [AtomicU32; MAX_VOICES],
    active: [AtomicBool; MAX_VOICES],
    active_voices: AtomicUsize,
    cpu_load: AtomicU32,
}

/// Plain copy of every meter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub active_voices: usize,
    pub cpu_load: f32,
    pub positions: [f32; MAX_VOICES],
    pub active: [bool; MAX_VOICES],
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            positions: std::array::from_fn(|_| AtomicU32::new(0.0f32.to_bits())),
            active: std::array::from_fn(|_| AtomicBool::new(false)),
            active_voices: AtomicUsize::new(0),
            cpu_load: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    /// Publish one voice's normalized position and active flag
    pub fn publish_voice(&self, slot: usize, position: f32, active: bool) {
        if let (Some(p), Some(a)) = (self.positions.get(slot), self.active.get(slot)) {
            p.store(position.to_bits(), Ordering::Relaxed);
            a.store(active, Ordering::Relaxed);
        }
    }

    /// Normalized playback position of a voice slot (0.0 when out of range)
    pub fn voice_position(&self, slot: usize) -> f32 {
        self.positions
            .get(slot)
            .map_or(0.0, |p| f32::from_bits(p.load(Ordering::Relaxed)))
    }

    pub fn voice_active(&self, slot: usize) -> bool {
        self.active
            .get(slot)
            .is_some_and(|a| a.load(Ordering::Relaxed))
    }

    pub fn set_active_voices(&self, count: usize) {
        self.active_voices.store(count, Ordering::Relaxed);
    }

    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    /// Store the processing load in percent, clamped to [0, 100]
    pub fn set_cpu_load(&self, percent: f32) {
        self.cpu_load
            .store(percent.clamp(0.0, 100.0).to_bits(), Ordering::Relaxed);
    }

    pub fn cpu_load(&self) -> f32 {
        f32::from_bits(self.cpu_load.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            active_voices: self.active_voices(),
            cpu_load: self.cpu_load(),
            positions: std::array::from_fn(|slot| self.voice_position(slot)),
            active: std::array::from_fn(|slot| self.voice_active(slot)),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Measures block processing time against the block's real-time budget
pub struct LoadMeter {
    sample_rate: f64,
    started: Option<Instant>,
}

impl LoadMeter {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            started: None,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Mark the start of a block
    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Finish a block of `frames` frames and return the load in percent
    pub fn end(&mut self, frames: usize) -> f32 {
        let Some(started) = self.started.take() else {
            return 0.0;
        };
        load_percent(started.elapsed().as_secs_f64(), frames, self.sample_rate)
    }
}

/// Elapsed time as a percentage of the time `frames` frames last
pub fn load_percent(elapsed_secs: f64, frames: usize, sample_rate: f64) -> f32 {
    let budget = frames as f64 / sample_rate;
    if budget <= 0.0 {
        return 0.0;
    }
    ((elapsed_secs / budget) * 100.0).clamp(0.0, 100.0) as f32
}
