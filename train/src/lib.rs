//! Triplet-loss training loop for speaker embedding networks.
//!
//! [`Trainer`] pulls batches from a [`deepspeaker_triplet::BatchBuilder`],
//! hands them to a [`SpeakerModel`] and keeps a single live checkpoint in a
//! [`CheckpointStore`]. The slice count per utterance, and with it the
//! network input shape, is fixed by the first batch of a run (or by
//! [`TrainConfig::num_slices`]) and checked on every later batch.
//!
//! The model only sees the tensor and a stub target vector: anchor,
//! positive and negative roles are implied by the block layout of the batch.

mod checkpoint;
pub mod config;
mod error;
mod loss;
mod model;
mod trainer;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::TrainConfig;
pub use error::TrainError;
pub use loss::{cosine_similarity, triplet_loss, DEFAULT_ALPHA};
pub use model::{ProjectionModel, SpeakerModel};
pub use trainer::{StepReport, Trainer};
