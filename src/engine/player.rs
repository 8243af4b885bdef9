//! Real-time audio playback using cpal
//!
//! The sampler moves into the output callback. Events arrive through an
//! rtrb ring and parameters through `SharedParameters`, so the callback
//! never takes a lock.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use super::{Sampler, SamplerEvent};
use crate::buffer::StereoBuffer;
use crate::params::SharedParameters;

/// Real-time audio player
pub struct Player {
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start playing the sampler on the named (or default) output device.
    ///
    /// The sampler is prepared for the device's sample rate before it moves
    /// into the callback.
    pub fn start(
        &mut self,
        mut sampler: Sampler,
        events: rtrb::Consumer<SamplerEvent>,
        parameters: Arc<SharedParameters>,
        device_name: Option<&str>,
    ) -> Result<()> {
        let device = find_output_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device
            .default_output_config()
            .with_context(|| format!("no output config for device '{}'", name))?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();

        sampler.prepare(f64::from(stream_config.sample_rate.0), sampler.block_size());
        info!(
            "output: {} ({} Hz, {} ch, {:?})",
            name, stream_config.sample_rate.0, stream_config.channels, sample_format
        );

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let render = BlockRenderer::new(sampler, events, parameters);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, render, running)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, render, running)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, render, running)?,
            _ => return Err(anyhow!("Unsupported sample format")),
        };

        stream.play()?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the output callback owns
struct BlockRenderer {
    sampler: Sampler,
    events: rtrb::Consumer<SamplerEvent>,
    parameters: Arc<SharedParameters>,
    block: StereoBuffer,
}

impl BlockRenderer {
    fn new(sampler: Sampler, events: rtrb::Consumer<SamplerEvent>, parameters: Arc<SharedParameters>) -> Self {
        let block = StereoBuffer::with_capacity(sampler.block_size());
        Self {
            sampler,
            events,
            parameters,
            block,
        }
    }

    /// Fill an interleaved device buffer, one sampler block at a time
    fn fill<T: cpal::Sample + cpal::FromSample<f32>>(&mut self, data: &mut [T], channels: usize) {
        let block_size = self.sampler.block_size();

        for chunk in data.chunks_mut(block_size * channels) {
            let frames = chunk.len() / channels;
            self.block.resize(frames);
            self.sampler.set_parameters(self.parameters.snapshot());
            self.sampler.process_block(&mut self.block, &mut self.events);

            for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                let (left, right) = self.block.frame(i);
                for (ch, sample) in frame.iter_mut().enumerate() {
                    let value = match ch {
                        0 => left,
                        1 => right,
                        _ => 0.0,
                    };
                    *sample = T::from_sample(value);
                }
            }
        }
    }

    fn fill_mono<T: cpal::Sample + cpal::FromSample<f32>>(&mut self, data: &mut [T]) {
        let block_size = self.sampler.block_size();

        for chunk in data.chunks_mut(block_size) {
            self.block.resize(chunk.len());
            self.sampler.set_parameters(self.parameters.snapshot());
            self.sampler.process_block(&mut self.block, &mut self.events);

            for (i, sample) in chunk.iter_mut().enumerate() {
                let (left, right) = self.block.frame(i);
                *sample = T::from_sample((left + right) * 0.5);
            }
        }
    }
}

fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mut render: BlockRenderer,
    running: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = usize::from(config.channels).max(1);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if !running.load(Ordering::SeqCst) {
                // Fill with silence when stopped
                for sample in data.iter_mut() {
                    *sample = T::from_sample(0.0f32);
                }
                return;
            }

            if channels == 1 {
                render.fill_mono(data);
            } else {
                render.fill(data, channels);
            }
        },
        |err| {
            error!("audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

fn find_output_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .output_devices()?
            .find(|d| d.name().map(|n| n.contains(wanted)).unwrap_or(false))
            .ok_or_else(|| anyhow!("Output device '{}' not found", wanted)),
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available")),
    }
}

/// List all available output devices with their default config
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
