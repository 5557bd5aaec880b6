//! Spectral feature slices for speaker embedding networks.
//!
//! # Pipeline
//!
//! A waveform is turned into a sequence of fixed-shape network inputs:
//!
//! 1. [`compute_fbank`]: waveform -> 64 mel filter-bank energies per 25ms frame
//! 2. [`delta`]: first and second order time derivatives
//! 3. [`normalize_frames`]: zero mean, unit variance per frame vector
//! 4. [`FeatureExtractor::extract`]: 16-frame windows stacked into
//!    (32, 32, 3) [`FeatureSlice`]s, one per frame position
//!
//! ```text
//! frame t:  [ fbank(64) | delta1(64) | delta2(64) ]  = 192 features
//! slice j:  frames j-8 .. j+8                         = 16 x 192 = 32 x 32 x 3
//! ```

mod delta;
mod error;
pub mod fbank;
mod slice;

pub use delta::{delta, normalize_frames, NORM_EPSILON};
pub use error::FeatureError;
pub use fbank::{compute_fbank, FbankConfig};
pub use slice::{
    extract, FeatureExtractor, FeatureSlice, EDGE_MARGIN, FRAME_FEATURES, NUM_FILTERS, SLICE_FRAMES,
    SLICE_LEN, SLICE_SHAPE,
};
