//! Sampler - polyphonic sample playback from the command line

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sampler::config::{self, SamplerConfig};
use sampler::engine::{self, BouncePlan, MidiListener, Player, Sampler};
use sampler::params::{parse_assignment, SharedParameters};
use sampler::sample::WavDecoder;
use sampler::state;

mod cli;

use cli::{Cli, Commands};

/// Capacity of the MIDI to audio event ring
const EVENT_QUEUE_SIZE: usize = 1024;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render {
            config: config_path,
            output,
            notes,
            hold,
            tail,
            velocity,
            set,
        } => {
            let cfg = load_patch(&config_path, &set)?;
            let mut sampler = Sampler::from_config(&cfg, &WavDecoder);
            if sampler.samples().is_empty() {
                warn!("no samples loaded, the render will be silent");
            }

            println!("Rendering {:?} for {}s + {}s tail to {:?}...", notes, hold, tail, output);
            let plan = BouncePlan {
                notes,
                velocity,
                hold_secs: hold,
                tail_secs: tail,
            };
            let report = engine::bounce_to_file(&mut sampler, &plan, &output)?;

            println!("Rendered {} frames", report.frames);
            println!("  Peak: {:.3}", report.peak);
            println!("  Active voices (max): {}", report.max_active_voices);
            println!("  Active voices (end): {}", report.final_active_voices);
            println!("  CPU load (max): {:.1}%", report.max_cpu_load);
        }

        Commands::Play {
            config: config_path,
            set,
        } => {
            let cfg = load_patch(&config_path, &set)?;
            let sampler = Sampler::from_config(&cfg, &WavDecoder);
            let telemetry = sampler.telemetry();
            let parameters = Arc::new(SharedParameters::new(sampler.parameters()));

            let (producer, consumer) = rtrb::RingBuffer::new(EVENT_QUEUE_SIZE);
            let midi = MidiListener::connect(
                cfg.audio.midi_port.as_deref(),
                producer,
                Arc::clone(&parameters),
            )?;

            let mut player = Player::new();
            player.start(sampler, consumer, Arc::clone(&parameters), cfg.audio.device.as_deref())?;

            let running = Arc::new(AtomicBool::new(true));
            let handler_flag = running.clone();
            ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
                .context("failed to install Ctrl-C handler")?;

            println!("Playing from '{}'. Press Ctrl-C to stop.", midi.port_name());
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(250));
                let meter = telemetry.snapshot();
                print!(
                    "\r  Voices: {:2}  CPU: {:5.1}%",
                    meter.active_voices, meter.cpu_load
                );
                use std::io::Write;
                std::io::stdout().flush()?;
            }

            player.stop();
            println!("\nStopped.");
        }

        Commands::Devices => {
            println!("Available audio devices:\n");

            let host = cpal::default_host();

            // Default output device
            if let Some(device) = host.default_output_device() {
                println!("Default output: {}", device.name().unwrap_or_default());
                println!();
            }

            println!("Output devices:");
            for (name, config) in engine::list_output_devices() {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }

            println!("\nMIDI inputs:");
            match engine::list_midi_inputs() {
                Ok(ports) if ports.is_empty() => println!("  (none)"),
                Ok(ports) => {
                    for port in ports {
                        println!("  - {}", port);
                    }
                }
                Err(e) => {
                    println!("  Error listing MIDI ports: {}", e);
                }
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    print_summary(&cfg);
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let path = "sampler.yaml";
            if Path::new(path).exists() {
                println!("sampler.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, config::EXAMPLE_CONFIG)?;
                println!("Created sampler.yaml with example configuration.");
            }
        }

        Commands::SaveState {
            config: config_path,
            output,
        } => {
            let cfg = config::load_config(&config_path)?;
            let sampler = Sampler::from_config(&cfg, &WavDecoder);
            let saved = sampler.export_state();

            state::save(&output, &saved)
                .with_context(|| format!("failed to write state to {:?}", output))?;
            println!(
                "Saved {} parameters and {} samples to {:?}",
                saved.parameter_count(),
                saved.sample_states().len(),
                output
            );
        }

        Commands::InspectState { state: state_path } => {
            let saved = state::load(&state_path)
                .with_context(|| format!("failed to read state from {:?}", state_path))?;

            match &saved.parameters {
                Some(values) => {
                    println!("Parameters:");
                    for (id, value) in values {
                        println!("  {}: {}", id, value);
                    }
                }
                None => println!("Parameters: (not saved)"),
            }
            println!("Samples: {}", saved.sample_states().len());
            for sample in saved.sample_states() {
                let present = if sample.path.exists() { "" } else { " [missing]" };
                println!(
                    "  - {} (root {}, notes {}-{}) {:?}{}",
                    sample.name, sample.root_note, sample.lowest_note, sample.highest_note, sample.path, present
                );
                if sample.loop_enabled {
                    println!(
                        "      loop {:.3}-{:.3} {:?}",
                        sample.loop_start, sample.loop_end, sample.loop_mode
                    );
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load a patch and apply `--set` overrides
fn load_patch(path: &Path, overrides: &[String]) -> Result<SamplerConfig> {
    info!("loading configuration from {:?}", path);
    let mut cfg = config::load_config(path)?;
    for assignment in overrides {
        let (id, value) = parse_assignment(assignment)?;
        cfg.parameters.set(id, value);
    }
    Ok(cfg)
}

fn print_summary(cfg: &SamplerConfig) {
    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
    println!("  Buffer size: {}", cfg.audio.buffer_size);
    println!(
        "  Voices: {} (steal: {:?})",
        cfg.engine.polyphony, cfg.engine.steal_policy
    );
    println!("  Master volume: {:.0}%", cfg.parameters.master_volume * 100.0);
    println!("  Samples: {}", cfg.samples.len());
    for sample in &cfg.samples {
        let status = if sample.path.exists() { "" } else { " [missing]" };
        let looping = if sample.loop_settings.enabled {
            format!(" loop {:?}", sample.loop_settings.mode)
        } else {
            String::new()
        };
        println!(
            "    - {:?} root {} notes {}-{}{}{}",
            sample.path,
            sample.root_note,
            sample.note_range.lowest,
            sample.note_range.highest,
            looping,
            status
        );
    }
}
