use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ocrqa::cli::{generate, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    dispatch(cli.command)
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            input,
            output,
            stats,
            samples,
            sample_count,
            run,
        } => generate::run(
            &input,
            &generate::Outputs {
                dataset: &output,
                stats: stats.as_deref(),
                samples: samples.as_deref(),
                sample_count,
            },
            &run,
        ),
        Commands::Entities { input, run } => ocrqa::cli::entities::run(&input, &run),
        Commands::Defaults { what } => ocrqa::cli::defaults::run(what),
    }
}
