use deepspeaker_triplet::TripletError;
use thiserror::Error;

/// Errors returned by the training loop.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Batch(#[from] TripletError),

    #[error("train: checkpoint io: {0}")]
    Io(String),

    #[error("train: invalid checkpoint format: {0}")]
    InvalidFormat(String),

    #[error("train: model error: {0}")]
    Model(String),

    #[error("train: config: {0}")]
    Config(String),
}
