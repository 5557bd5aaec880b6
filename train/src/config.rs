//! Run configuration.
//!
//! Stored as YAML; every field is optional and falls back to its default.
//!
//! ```yaml
//! dataset_dir: audio/LibriSpeechSamples/
//! checkpoint_dir: checkpoints
//! sample_rate: 16000
//! truncate_seconds: 2
//! num_triplets: 6
//! seed: 42
//! ```

use std::path::{Path, PathBuf};

use deepspeaker_triplet::BatchConfig;
use serde::{Deserialize, Serialize};

use crate::error::TrainError;

/// Default corpus location.
pub const DEFAULT_DATASET_DIR: &str = "audio/LibriSpeechSamples/";
/// Default checkpoint directory.
pub const DEFAULT_CHECKPOINT_DIR: &str = "checkpoints";

/// Training run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// LibriSpeech-style corpus of `.wav` files.
    pub dataset_dir: PathBuf,

    /// Directory holding the single live checkpoint.
    pub checkpoint_dir: PathBuf,

    /// 8000 or 16000.
    pub sample_rate: u32,

    /// Seconds of audio kept per utterance. 2 or more is recommended.
    pub truncate_seconds: f64,

    /// Triplets per batch.
    pub num_triplets: usize,

    /// Slices per utterance. Taken from the first batch when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_slices: Option<usize>,

    /// Embedding size of the reference projection model.
    pub embedding_dim: usize,

    /// Triplet loss margin.
    pub alpha: f32,

    /// Seed for triplet sampling and model init. Random when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Write a checkpoint every this many steps.
    pub checkpoint_every: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let batch = BatchConfig::default();
        Self {
            dataset_dir: PathBuf::from(DEFAULT_DATASET_DIR),
            checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
            sample_rate: batch.sample_rate,
            truncate_seconds: batch.truncate_seconds,
            num_triplets: batch.num_triplets,
            num_slices: None,
            embedding_dim: 512,
            alpha: crate::loss::DEFAULT_ALPHA,
            seed: None,
            checkpoint_every: 1,
        }
    }
}

impl TrainConfig {
    /// Reads a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrainError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrainError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Parses a YAML configuration.
    pub fn from_yaml(content: &str) -> Result<Self, TrainError> {
        let cfg: Self = serde_yaml::from_str(content).map_err(|e| TrainError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Batch construction settings.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            sample_rate: self.sample_rate,
            truncate_seconds: self.truncate_seconds,
            num_triplets: self.num_triplets,
        }
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        self.batch_config().validate()?;
        if self.embedding_dim == 0 {
            return Err(TrainError::Config("embedding_dim must be positive".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(TrainError::Config("checkpoint_every must be positive".into()));
        }
        if self.num_slices == Some(0) {
            return Err(TrainError::Config("num_slices must be positive".into()));
        }
        Ok(())
    }
}
