//! CLI for the karaprep job supervisor.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use karaprep_core::config;
use karaprep_core::status::StatusSink;
use std::path::PathBuf;

use commands::{run_separate, run_tokenize};

/// Top-level CLI for the karaprep job supervisor.
#[derive(Debug, Parser)]
#[command(name = "karaprep")]
#[command(about = "karaprep: supervised audio separation and lyric tokenization jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Separate an audio file into vocal and instrumental stems.
    Separate {
        /// Input audio file.
        input: PathBuf,

        /// Directory receiving Vocals.<ext> and Instrumental.<ext>.
        #[arg(long)]
        output_dir: PathBuf,

        /// Separation model (defaults to the configured model).
        #[arg(long)]
        model: Option<String>,

        /// Model cache directory (defaults to the configured cache dir).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Tokenize a JSON document of lyric lines with the configured tokenizer.
    Tokenize {
        /// Input JSON document; `-` reads standard input.
        input: PathBuf,

        /// File receiving the tokenized document.
        #[arg(long)]
        output: PathBuf,
    },
}

impl CliCommand {
    /// Parse arguments, run the selected job, and return the process exit
    /// code (0 on success, the subordinate's code on engine failure).
    pub fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let sink = StatusSink::stdout();

        let code = match cli.command {
            CliCommand::Separate {
                input,
                output_dir,
                model,
                cache_dir,
            } => run_separate(&cfg, &sink, input, output_dir, model, cache_dir),
            CliCommand::Tokenize { input, output } => run_tokenize(&cfg, &sink, input, output),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests;
