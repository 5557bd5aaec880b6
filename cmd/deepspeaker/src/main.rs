//! deepspeaker - Train speaker embeddings with triplet loss.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BatchCommand, TrainCommand};

/// deepspeaker - Train speaker embeddings with triplet loss.
///
/// Batches are built from a LibriSpeech-style tree of `.wav` files
/// (`speaker/chapter/speaker-chapter-utterance.wav`). FLAC corpora must be
/// converted to WAV first.
#[derive(Parser)]
#[command(name = "deepspeaker")]
#[command(about = "Triplet-loss speaker embedding trainer")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train until interrupted (or for --steps steps)
    Train(TrainCommand),
    /// Build one batch and print its layout
    Batch(BatchCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Train(cmd) => cmd.run(&cli),
        Commands::Batch(cmd) => cmd.run(&cli),
    }
}
