//! Offline rendering
//!
//! Plays a chord through the sampler block by block, holding it for a
//! while and then letting the release tail ring out.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::buffer::StereoBuffer;

use super::{Recorder, Sampler, SamplerEvent};

/// What to play and for how long
#[derive(Debug, Clone, PartialEq)]
pub struct BouncePlan {
    pub notes: Vec<u8>,
    pub velocity: u8,
    /// Seconds the notes are held
    pub hold_secs: f64,
    /// Seconds rendered after the notes are released
    pub tail_secs: f64,
}

impl Default for BouncePlan {
    fn default() -> Self {
        Self {
            notes: vec![60],
            velocity: 100,
            hold_secs: 2.0,
            tail_secs: 1.0,
        }
    }
}

/// Summary of a finished render
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BounceReport {
    pub frames: u64,
    pub peak: f32,
    pub max_active_voices: usize,
    /// Highest per-block processing load seen, in percent
    pub max_cpu_load: f32,
    /// Voices still sounding when the render ended
    pub final_active_voices: usize,
}

/// Render a plan block by block, handing every block to `sink`
pub fn render_notes<F>(sampler: &mut Sampler, plan: &BouncePlan, mut sink: F) -> Result<BounceReport>
where
    F: FnMut(&StereoBuffer) -> Result<()>,
{
    let sample_rate = sampler.sample_rate();
    let block_size = sampler.block_size();
    let hold_frames = (plan.hold_secs.max(0.0) * sample_rate).round() as u64;
    let total_frames = hold_frames + (plan.tail_secs.max(0.0) * sample_rate).round() as u64;

    let telemetry = sampler.telemetry();
    let mut events: VecDeque<SamplerEvent> = plan
        .notes
        .iter()
        .map(|&note| SamplerEvent::note_on(note, plan.velocity))
        .collect();
    let mut released = false;
    let mut buffer = StereoBuffer::with_capacity(block_size);
    let mut report = BounceReport::default();

    while report.frames < total_frames {
        if !released && report.frames >= hold_frames {
            events.extend(plan.notes.iter().map(|&note| SamplerEvent::NoteOff { note }));
            released = true;
        }

        let remaining = (total_frames - report.frames) as usize;
        // Stop exactly at the release point so note-offs land on time
        let until_release = if released {
            remaining
        } else {
            (hold_frames - report.frames) as usize
        };
        buffer.resize(block_size.min(remaining).min(until_release.max(1)));

        sampler.process_block(&mut buffer, &mut events);
        sink(&buffer)?;

        report.frames += buffer.len() as u64;
        report.peak = report.peak.max(buffer.peak());
        report.max_active_voices = report.max_active_voices.max(telemetry.active_voices());
        report.max_cpu_load = report.max_cpu_load.max(telemetry.cpu_load());
    }

    report.final_active_voices = telemetry.active_voices();
    Ok(report)
}

/// Render a plan to a stereo 32-bit float WAV file
pub fn bounce_to_file(sampler: &mut Sampler, plan: &BouncePlan, path: &Path) -> Result<BounceReport> {
    let mut recorder = Recorder::new(path, sampler.sample_rate().round() as u32)?;
    let report = render_notes(sampler, plan, |block| recorder.write_buffer(block))?;
    recorder.finalize()?;

    info!(
        "rendered {:.2}s to {} (peak {:.3})",
        report.frames as f64 / sampler.sample_rate(),
        path.display(),
        report.peak
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterId;
    use crate::sample::DecodedAudio;
    use tempfile::TempDir;

    const RATE: f64 = 1000.0;

    fn sampler() -> Sampler {
        let mut sampler = Sampler::new(RATE, 64);
        sampler.load_sample(DecodedAudio::mono(vec![0.5; 5000], RATE as u32), 60);
        sampler.set_parameter(ParameterId::EnvRelease, 0.1);
        sampler
    }

    #[test]
    fn test_render_length_and_voices() {
        let mut sampler = sampler();
        let plan = BouncePlan {
            notes: vec![60, 64, 67],
            velocity: 127,
            hold_secs: 0.5,
            tail_secs: 0.25,
        };

        let mut frames = 0;
        let report = render_notes(&mut sampler, &plan, |block| {
            assert!(block.len() <= 64);
            frames += block.len();
            Ok(())
        })
        .unwrap();

        assert_eq!(frames, 750);
        assert_eq!(report.frames, 750);
        assert_eq!(report.max_active_voices, 3);
        // 100ms release has finished within the 250ms tail
        assert_eq!(report.final_active_voices, 0);
        assert!(report.peak > 0.0);
        assert!((0.0..=100.0).contains(&report.max_cpu_load));
    }

    #[test]
    fn test_bounce_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let mut sampler = sampler();

        let plan = BouncePlan {
            hold_secs: 0.1,
            tail_secs: 0.1,
            ..BouncePlan::default()
        };
        bounce_to_file(&mut sampler, &plan, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 1000);
        assert_eq!(reader.len(), 400);
    }

    #[test]
    fn test_sink_error_stops_render() {
        let mut sampler = sampler();
        let result = render_notes(&mut sampler, &BouncePlan::default(), |_| {
            anyhow::bail!("disk full")
        });
        assert!(result.is_err());
    }
}
