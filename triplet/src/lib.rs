//! Speaker-balanced triplet batches for triplet-loss training.
//!
//! # Architecture
//!
//! ```text
//! CorpusIndex -> sample_triplets -> Batch [anchors | positives | negatives]
//!             -> AudioLoader -> align_waveforms -> FeatureExtractor
//!             -> TrainingTensor (3N x S, 32, 32, 3)
//! ```
//!
//! Anchor `i` and positive `i` share a speaker; negative `i` does not. The
//! loss reads these roles from position only, so the block order of a
//! [`Batch`] is fixed at construction and re-checked by
//! [`verify_triplet_identity`] before a tensor is handed out.
//!
//! Every waveform of a batch is repeated end to end up to
//! `truncate_seconds x sample_rate` samples and then truncated to one common
//! length, so all items produce the same number of slices.

mod align;
mod batch;
mod corpus;
mod error;
mod loader;
mod sampler;
mod tensor;

pub use align::{align_waveforms, repeat_to_length};
pub use batch::{verify_triplet_identity, Batch, BatchBuilder, BatchConfig, SlicePin, MAX_TRUNCATE_SECONDS};
pub use corpus::{CorpusIndex, UtteranceRecord};
pub use error::TripletError;
pub use loader::{AudioLoader, WavLoader};
pub use sampler::{sample_triplet, sample_triplets, Triplet};
pub use tensor::TrainingTensor;
