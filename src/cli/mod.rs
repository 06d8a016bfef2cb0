pub mod defaults;
pub mod entities;
pub mod generate;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "ocrqa",
    about = "Build Q&A fine-tuning datasets from OCR'd technical documentation",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a JSONL Q&A dataset from an OCR text file
    Generate {
        /// OCR text file
        input: PathBuf,
        /// Dataset output path
        #[arg(short, long, default_value = "qa_dataset.jsonl")]
        output: PathBuf,
        /// Statistics output path (defaults next to the dataset)
        #[arg(long)]
        stats: Option<PathBuf>,
        /// Write a readable sample of the dataset to this path
        #[arg(long)]
        samples: Option<PathBuf>,
        /// Number of pairs in the sample file
        #[arg(long, default_value_t = 20)]
        sample_count: usize,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print extracted entities as JSON lines
    Entities {
        /// OCR text file
        input: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print a built-in configuration as JSON
    Defaults {
        #[arg(value_enum)]
        what: DefaultsKind,
    },
}

/// Settings shared by commands that run the pipeline. Flags override the
/// config file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON pipeline config
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// JSON pattern rules, replacing the built-in set
    #[arg(long)]
    pub rules: Option<PathBuf>,
    /// JSON question templates, replacing the built-in set
    #[arg(long)]
    pub templates: Option<PathBuf>,
    /// Maximum words per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Skip OCR cleanup
    #[arg(long)]
    pub no_clean: bool,
    /// Extract chunks in parallel
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DefaultsKind {
    /// Entity pattern rules
    Patterns,
    /// Question templates
    Templates,
    /// Pipeline config
    Config,
}

impl RunArgs {
    pub fn resolve(&self) -> anyhow::Result<crate::config::PipelineConfig> {
        let mut config = crate::config::PipelineConfig::load_or_default(self.config.as_deref())?;
        if let Some(rules) = &self.rules {
            config.rules = Some(rules.clone());
        }
        if let Some(templates) = &self.templates {
            config.templates = Some(templates.clone());
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if self.no_clean {
            config.clean = false;
        }
        if self.parallel {
            config.parallel = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocrqa.json");
        std::fs::write(&path, r#"{"chunk_size": 50, "parallel": false}"#).unwrap();

        let args = RunArgs {
            config: Some(path),
            chunk_size: Some(10),
            parallel: true,
            no_clean: true,
            ..RunArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.chunk_size, 10);
        assert!(config.parallel);
        assert!(!config.clean);
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::parse_from(["ocrqa", "-vv", "generate", "in.txt", "--chunk-size", "200"]);
        assert_eq!(cli.verbose, 2);
        let Commands::Generate { input, output, run, .. } = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(input, PathBuf::from("in.txt"));
        assert_eq!(output, PathBuf::from("qa_dataset.jsonl"));
        assert_eq!(run.chunk_size, Some(200));
    }
}
