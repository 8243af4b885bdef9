//! Audio file decoding
//!
//! The store never touches files itself; it takes whatever a [`Decoder`]
//! hands it. [`WavDecoder`] reads WAV files through `hound`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader};

/// Error types for decoding audio files
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode WAV data: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },

    #[error("audio file has no channels")]
    NoChannels,
}

/// Planar floating-point audio with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![left, right],
            sample_rate,
        }
    }

    /// Length of the first channel in frames
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Source of decoded audio
pub trait Decoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError>;
}

/// WAV decoder keeping at most the first two channels
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
        let file = File::open(path)?;
        let mut reader = WavReader::new(BufReader::new(file))?;
        let spec = reader.spec();

        let channel_count = usize::from(spec.channels);
        if channel_count == 0 {
            return Err(DecodeError::NoChannels);
        }
        let kept = channel_count.min(2);
        let mut channels = vec![Vec::with_capacity(reader.len() as usize / channel_count); kept];

        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => {
                for (i, sample) in reader.samples::<f32>().enumerate() {
                    let sample = sample?;
                    if let Some(channel) = channels.get_mut(i % channel_count) {
                        channel.push(sample);
                    }
                }
            }
            (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                for (i, sample) in reader.samples::<i32>().enumerate() {
                    let sample = sample?;
                    if let Some(channel) = channels.get_mut(i % channel_count) {
                        channel.push(sample as f32 * scale);
                    }
                }
            }
            (SampleFormat::Float, bits) => {
                return Err(DecodeError::UnsupportedFormat {
                    bits,
                    format: "float",
                })
            }
            (SampleFormat::Int, bits) => {
                return Err(DecodeError::UnsupportedFormat {
                    bits,
                    format: "integer",
                })
            }
        }

        Ok(DecodedAudio {
            channels,
            sample_rate: spec.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::NamedTempFile;

    #[test]
    fn test_decode_float_stereo() {
        let file = NamedTempFile::new().unwrap();
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for i in 0..100 {
            writer.write_sample(i as f32 / 100.0).unwrap();
            writer.write_sample(-(i as f32) / 100.0).unwrap();
        }
        writer.finalize().unwrap();

        let audio = WavDecoder.decode(file.path()).unwrap();
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.channels.len(), 2);
        assert_eq!(audio.frame_count(), 100);
        assert_eq!(audio.channels[0][50], 0.5);
        assert_eq!(audio.channels[1][50], -0.5);
    }

    #[test]
    fn test_decode_int16_normalizes() {
        let file = NamedTempFile::new().unwrap();
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        writer.write_sample(i16::MIN).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.finalize().unwrap();

        let audio = WavDecoder.decode(file.path()).unwrap();
        assert_eq!(audio.channels.len(), 1);
        assert_eq!(audio.channels[0], vec![-1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = WavDecoder
            .decode(Path::new("/definitely/not/here.wav"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }

    #[test]
    fn test_decode_garbage() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a wav file at all").unwrap();

        let err = WavDecoder.decode(file.path()).unwrap_err();
        assert!(matches!(err, DecodeError::Wav(_)));
    }
}
