use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use deepspeaker_train::{ProjectionModel, TrainConfig, Trainer};
use deepspeaker_triplet::{BatchBuilder, CorpusIndex, WavLoader};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::Cli;

/// Overrides shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Corpus directory
    #[arg(short = 'd', long)]
    pub dataset: Option<PathBuf>,

    /// Sample rate of the corpus (8000 or 16000)
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Seconds of audio kept per utterance
    #[arg(long)]
    pub truncate_seconds: Option<f64>,

    /// Triplets per batch
    #[arg(short = 'n', long)]
    pub num_triplets: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RunArgs {
    fn apply(&self, cfg: &mut TrainConfig) {
        if let Some(d) = &self.dataset {
            cfg.dataset_dir = d.clone();
        }
        if let Some(v) = self.sample_rate {
            cfg.sample_rate = v;
        }
        if let Some(v) = self.truncate_seconds {
            cfg.truncate_seconds = v;
        }
        if let Some(v) = self.num_triplets {
            cfg.num_triplets = v;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
    }
}

/// Train until interrupted.
#[derive(Args, Debug)]
pub struct TrainCommand {
    #[command(flatten)]
    pub run: RunArgs,

    /// Checkpoint directory
    #[arg(long)]
    pub checkpoints: Option<PathBuf>,

    /// Stop after this many steps
    #[arg(long)]
    pub steps: Option<u64>,
}

impl TrainCommand {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let mut cfg = load_config(cli)?;
        self.run.apply(&mut cfg);
        if let Some(dir) = &self.checkpoints {
            cfg.checkpoint_dir = dir.clone();
        }
        cfg.validate()?;

        let corpus = scan_corpus(&cfg)?;
        let seed = cfg.seed.unwrap_or_else(rand::random);
        let model = ProjectionModel::new(cfg.embedding_dim, cfg.alpha, seed);
        let mut trainer = Trainer::new(
            &cfg,
            corpus,
            WavLoader::new(cfg.sample_rate),
            model,
            StdRng::seed_from_u64(seed),
        )?;

        let step = trainer.run(self.steps)?;
        info!("stopped after step {step}");
        Ok(())
    }
}

/// Build one batch and print its layout.
#[derive(Args, Debug)]
pub struct BatchCommand {
    #[command(flatten)]
    pub run: RunArgs,
}

impl BatchCommand {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let mut cfg = load_config(cli)?;
        self.run.apply(&mut cfg);
        cfg.validate()?;

        let corpus = scan_corpus(&cfg)?;
        let builder = BatchBuilder::new(cfg.batch_config(), WavLoader::new(cfg.sample_rate))?;
        let mut rng = StdRng::seed_from_u64(cfg.seed.unwrap_or_else(rand::random));
        let batch = builder.build(&corpus, &mut rng)?;
        let tensor = batch.to_tensor()?;

        let n = batch.num_triplets();
        for (i, record) in batch.records().iter().enumerate() {
            let role = match i / n {
                0 => "anchor",
                1 => "positive",
                _ => "negative",
            };
            println!(
                "{:>3}  {:<8}  speaker={:<8} chapter={:<8} {}",
                i,
                role,
                record.speaker_id,
                record.chapter_id,
                record.file.display()
            );
        }
        println!("aligned samples: {}", batch.aligned_len().unwrap_or(0));
        println!("slices per item: {}", tensor.slices_per_item());
        println!("tensor shape:    {:?}", tensor.shape());
        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<TrainConfig> {
    match &cli.config {
        Some(path) => TrainConfig::load(path).with_context(|| format!("load config {path}")),
        None => Ok(TrainConfig::default()),
    }
}

fn scan_corpus(cfg: &TrainConfig) -> Result<CorpusIndex> {
    info!("looking for audio [wav] files in {}", cfg.dataset_dir.display());
    let corpus = CorpusIndex::scan_librispeech(&cfg.dataset_dir)?;
    if corpus.is_empty() {
        warn!("no .wav files found; convert FLAC files to WAV first");
        bail!("empty corpus: {}", cfg.dataset_dir.display());
    }
    info!(
        "found {} utterances from {} speakers",
        corpus.len(),
        corpus.num_speakers()
    );
    Ok(corpus)
}
