use std::path::PathBuf;

use deepspeaker_features::FeatureError;
use thiserror::Error;

/// Errors returned while sampling, loading and assembling batches.
#[derive(Debug, Error)]
pub enum TripletError {
    #[error("triplet: not enough speakers: need at least 2, got {got}")]
    NotEnoughSpeakers { got: usize },

    #[error("triplet: speaker {speaker} has {got} utterance(s), need at least 2")]
    NotEnoughUtterances { speaker: String, got: usize },

    #[error("triplet: audio unavailable: {}: {reason}", path.display())]
    AudioUnavailable { path: PathBuf, reason: String },

    #[error("triplet: decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("triplet: empty audio: {}", path.display())]
    EmptyAudio { path: PathBuf },

    #[error("triplet: slice count mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("triplet: batch audio not loaded")]
    NotLoaded,

    #[error("triplet: invalid config: {0}")]
    InvalidConfig(String),

    #[error("triplet: corpus: {0}")]
    Corpus(String),

    #[error(transparent)]
    Features(#[from] FeatureError),
}

impl TripletError {
    /// True when the corpus cannot supply a valid triplet.
    pub fn is_data_scarcity(&self) -> bool {
        matches!(self, Self::NotEnoughSpeakers { .. } | Self::NotEnoughUtterances { .. })
    }

    /// True when a referenced audio file could not be read or decoded.
    pub fn is_audio_unavailable(&self) -> bool {
        matches!(self, Self::AudioUnavailable { .. } | Self::Decode { .. } | Self::EmptyAudio { .. })
    }
}
