//! Loopgen CLI
//!
//! Command-line interface for the loop generation engine.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use loopgen::cli::{commands, Cli, Commands};

/// Exit code when no strategy could loop the input
const EXIT_NO_LOOP: u8 = 2;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!("loopgen v{}", env!("CARGO_PKG_VERSION"));

    let looped = match cli.command {
        Commands::Loop {
            input,
            output,
            bpm,
            prompt,
            seed,
            options,
        } => commands::run_loop(&input, output.as_deref(), bpm, prompt, seed, &options)?,
        Commands::Analyze { input, options } => {
            commands::analyze(&input, &options)?;
            true
        }
        Commands::Join {
            first,
            second,
            output,
            crossfade_ms,
        } => {
            commands::join(&first, &second, &output, crossfade_ms)?;
            true
        }
        Commands::Batch {
            input_dir,
            output_dir,
            options,
        } => commands::batch(&input_dir, &output_dir, &options)?,
    };

    Ok(if looped {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NO_LOOP)
    })
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
