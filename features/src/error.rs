use thiserror::Error;

/// Errors returned by feature extraction.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("features: empty signal")]
    EmptySignal,

    #[error("features: invalid config: {0}")]
    InvalidConfig(String),
}
