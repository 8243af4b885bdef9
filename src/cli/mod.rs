//! CLI interface for the sampler

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polyphonic sample-playback synthesizer
#[derive(Parser)]
#[command(name = "sampler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render held notes to a stereo WAV file
    Render {
        /// Patch file path
        #[arg(short, long, default_value = "sampler.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// MIDI notes to hold, comma separated
        #[arg(short, long, value_delimiter = ',', default_value = "60")]
        notes: Vec<u8>,

        /// Seconds the notes are held
        #[arg(long, default_value = "2.0")]
        hold: f64,

        /// Seconds rendered after release
        #[arg(long, default_value = "1.0")]
        tail: f64,

        /// Note velocity (1-127)
        #[arg(long, default_value = "100", value_parser = clap::value_parser!(u8).range(1..=127))]
        velocity: u8,

        /// Override a parameter, e.g. --set filter_cutoff=2000
        #[arg(long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,
    },

    /// Play a patch in real time from a MIDI input
    Play {
        /// Patch file path
        #[arg(short, long, default_value = "sampler.yaml")]
        config: PathBuf,

        /// Override a parameter, e.g. --set env_release=2.0
        #[arg(long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,
    },

    /// List audio output devices and MIDI input ports
    Devices,

    /// Validate a patch file
    Check {
        /// Patch file path
        #[arg(short, long, default_value = "sampler.yaml")]
        config: PathBuf,
    },

    /// Generate an example patch file
    Init,

    /// Save the persisted state of a patch
    SaveState {
        /// Patch file path
        #[arg(short, long, default_value = "sampler.yaml")]
        config: PathBuf,

        /// State file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print a summary of a saved state file
    InspectState {
        /// State file path
        state: PathBuf,
    },
}
