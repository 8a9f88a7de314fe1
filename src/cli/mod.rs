//! CLI Module
//!
//! Command-line interface for the loop generation engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::strategy::StrategyId;

/// Loopgen - turn recordings into seamless loops
#[derive(Parser, Debug)]
#[command(name = "loopgen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the commands that generate loops
#[derive(clap::Args, Debug, Clone)]
pub struct LoopOptions {
    /// Shortest acceptable loop in milliseconds [default: half of --max-duration]
    #[arg(long)]
    pub min_duration: Option<u64>,

    /// Length of the source material in seconds
    #[arg(long, default_value_t = 30)]
    pub max_duration: u64,

    /// Only try this strategy
    #[arg(long)]
    pub strategy: Option<StrategyId>,

    /// Engine config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Finish with a tail-into-head crossfade (shortens the loop)
    #[arg(long)]
    pub crossfade: bool,

    /// Skip the final crossfade even if the config file enables it
    #[arg(long, conflicts_with = "crossfade")]
    pub no_crossfade: bool,

    /// Fall back to fading the whole buffer when nothing else works
    #[arg(long)]
    pub fade_fallback: bool,

    /// Output bit depth (16, 24 or 32 for float)
    #[arg(long, default_value_t = 16)]
    pub bit_depth: u16,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a loop from a WAV file
    #[command(name = "loop")]
    Loop {
        /// Source WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file [default: timestamped name next to the input]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tempo of the source, recorded in the report and file name
        #[arg(long)]
        bpm: Option<u32>,

        /// Prompt the source was generated from
        #[arg(long)]
        prompt: Option<String>,

        /// Seed the source was generated with
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        options: LoopOptions,
    },

    /// Report which strategies can loop a WAV file
    #[command(name = "analyze")]
    Analyze {
        /// Source WAV file
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        options: LoopOptions,
    },

    /// Join two WAV files with a crossfade
    #[command(name = "join")]
    Join {
        first: PathBuf,

        second: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Overlap in milliseconds
        #[arg(long, default_value_t = 50)]
        crossfade_ms: u64,
    },

    /// Generate loops for every WAV file under a directory
    #[command(name = "batch")]
    Batch {
        /// Directory searched recursively for WAV files
        #[arg(long)]
        input_dir: PathBuf,

        /// Directory receiving the loops
        #[arg(long)]
        output_dir: PathBuf,

        #[command(flatten)]
        options: LoopOptions,
    },
}
