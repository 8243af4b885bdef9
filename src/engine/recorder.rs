//! WAV file recorder
//!
//! Records stereo output to 32-bit float WAV files.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::buffer::StereoBuffer;

/// WAV file recorder
pub struct Recorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    frames_written: u64,
}

impl Recorder {
    /// Create a new recorder
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer,
            sample_rate,
            frames_written: 0,
        })
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of stereo frames written
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Get the duration recorded in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames_written as f64 / self.sample_rate as f64
    }

    /// Write one stereo frame
    pub fn write_frame(&mut self, left: f32, right: f32) -> Result<()> {
        self.writer
            .write_sample(left)
            .context("failed to write sample")?;
        self.writer
            .write_sample(right)
            .context("failed to write sample")?;
        self.frames_written += 1;
        Ok(())
    }

    /// Write every frame of a buffer, interleaved
    pub fn write_buffer(&mut self, buffer: &StereoBuffer) -> Result<()> {
        for (&left, &right) in buffer.left().iter().zip(buffer.right()) {
            self.write_frame(left, right)?;
        }
        Ok(())
    }

    /// Finalize the WAV file
    ///
    /// This must be called to properly close the file and write the header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize().context("failed to finalize WAV file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_recorder_creation() {
        let file = NamedTempFile::new().unwrap();
        let recorder = Recorder::new(file.path(), 44100).unwrap();

        assert_eq!(recorder.sample_rate(), 44100);
        assert_eq!(recorder.frames_written(), 0);
        assert_eq!(recorder.duration_secs(), 0.0);
    }

    #[test]
    fn test_recorder_write_buffer() {
        let file = NamedTempFile::new().unwrap();
        let mut recorder = Recorder::new(file.path(), 44100).unwrap();

        let mut buffer = StereoBuffer::new(5);
        buffer.add(2, 0.5, -0.5);
        recorder.write_buffer(&buffer).unwrap();

        assert_eq!(recorder.frames_written(), 5);
    }

    #[test]
    fn test_recorder_duration() {
        let file = NamedTempFile::new().unwrap();
        let mut recorder = Recorder::new(file.path(), 44100).unwrap();

        // Write 1 second of frames
        for _ in 0..44100 {
            recorder.write_frame(0.0, 0.0).unwrap();
        }

        assert!((recorder.duration_secs() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_recorder_produces_valid_wav() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        {
            let mut recorder = Recorder::new(&path, 48000).unwrap();
            for i in 0..1000 {
                let sample = (i as f32 / 1000.0 * std::f32::consts::PI * 2.0).sin();
                recorder.write_frame(sample, -sample).unwrap();
            }
            recorder.finalize().unwrap();
        }

        // Read back and verify
        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();

        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, SampleFormat::Float);

        let samples: Vec<f32> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 2000);
        assert_eq!(samples[1], -samples[0]);
    }
}
