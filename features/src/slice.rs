use crate::delta::{delta, normalize_frames};
use crate::error::FeatureError;
use crate::fbank::{compute_fbank, FbankConfig};

/// Frames per slice.
pub const SLICE_FRAMES: usize = 16;

/// Frames skipped on each side of the slicing window.
pub const EDGE_MARGIN: usize = SLICE_FRAMES / 2;

/// Number of filter-bank bins per frame before stacking.
pub const NUM_FILTERS: usize = 64;

/// Features per frame: filter banks, first delta and second delta.
pub const FRAME_FEATURES: usize = NUM_FILTERS * 3;

/// Network input layout of one slice: (height, width, channels).
pub const SLICE_SHAPE: [usize; 3] = [32, 32, 3];

/// Number of values in one slice (16 x 192 = 32 x 32 x 3).
pub const SLICE_LEN: usize = SLICE_FRAMES * FRAME_FEATURES;

const _: () = assert!(SLICE_LEN == SLICE_SHAPE[0] * SLICE_SHAPE[1] * SLICE_SHAPE[2]);

/// A fixed-shape network input: 16 consecutive frames of 192 features,
/// stored row-major and viewed as a (32, 32, 3) tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSlice {
    data: Box<[f32; SLICE_LEN]>,
}

impl FeatureSlice {
    fn from_frames(frames: &[Vec<f32>]) -> Self {
        debug_assert_eq!(frames.len(), SLICE_FRAMES);
        let mut data = Box::new([0.0f32; SLICE_LEN]);
        for (row, frame) in data.chunks_exact_mut(FRAME_FEATURES).zip(frames) {
            row.copy_from_slice(frame);
        }
        Self { data }
    }

    /// Flat row-major view of the (32, 32, 3) tensor.
    pub fn as_slice(&self) -> &[f32] {
        &self.data[..]
    }

    /// Value at `(row, col, channel)` of the (32, 32, 3) view.
    pub fn get(&self, row: usize, col: usize, channel: usize) -> f32 {
        let [_, w, c] = SLICE_SHAPE;
        self.data[(row * w + col) * c + channel]
    }

    /// The 192 features of frame `i` (0..16) inside this slice.
    pub fn frame(&self, i: usize) -> &[f32] {
        &self.data[i * FRAME_FEATURES..(i + 1) * FRAME_FEATURES]
    }
}

/// Converts waveforms into ordered sequences of [`FeatureSlice`]s.
///
/// # Pipeline
///
/// 1. 64 filter-bank energies per 25ms frame ([`compute_fbank`])
/// 2. First delta of the energies, then delta of the first delta
/// 3. Each of the three sequences normalized per frame
/// 4. `[fbank | delta1 | delta2]` stacked into 192 features per frame
/// 5. 16-frame windows slid by one frame, 8 frames of margin on each side
///
/// A waveform of `F` frames yields `F - 16` slices (none if `F <= 16`).
/// Extraction is deterministic.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    cfg: FbankConfig,
}

impl FeatureExtractor {
    /// Creates an extractor with the default filter-bank settings at `sample_rate`.
    pub fn new(sample_rate: usize) -> Self {
        Self::with_config(FbankConfig::with_sample_rate(sample_rate))
    }

    /// Creates an extractor with a custom filter-bank configuration.
    ///
    /// The number of filters is forced to 64 so slices keep their shape.
    pub fn with_config(mut cfg: FbankConfig) -> Self {
        cfg.num_filters = NUM_FILTERS;
        Self { cfg }
    }

    /// Sample rate the extractor expects.
    pub fn sample_rate(&self) -> usize {
        self.cfg.sample_rate
    }

    /// Number of slices produced for a waveform of `num_samples` samples.
    pub fn num_slices(&self, num_samples: usize) -> usize {
        self.cfg.num_frames(num_samples).saturating_sub(SLICE_FRAMES)
    }

    /// Extracts the slice sequence for one waveform, in temporal order.
    pub fn extract(&self, waveform: &[f32]) -> Result<Vec<FeatureSlice>, FeatureError> {
        let frames = self.frame_features(waveform)?;
        let num_frames = frames.len();
        if num_frames <= SLICE_FRAMES {
            return Ok(Vec::new());
        }

        let mut slices = Vec::with_capacity(num_frames - SLICE_FRAMES);
        for j in EDGE_MARGIN..num_frames - EDGE_MARGIN {
            slices.push(FeatureSlice::from_frames(&frames[j - EDGE_MARGIN..j + EDGE_MARGIN]));
        }
        Ok(slices)
    }

    /// Per-frame stacked features `[num_frames][192]` before slicing.
    pub fn frame_features(&self, waveform: &[f32]) -> Result<Vec<Vec<f32>>, FeatureError> {
        let mut banks = compute_fbank(waveform, &self.cfg)?;
        let mut delta1 = delta(&banks, 1);
        let mut delta2 = delta(&delta1, 1);

        normalize_frames(&mut banks);
        normalize_frames(&mut delta1);
        normalize_frames(&mut delta2);

        Ok(banks
            .iter()
            .zip(&delta1)
            .zip(&delta2)
            .map(|((b, d1), d2)| b.iter().chain(d1).chain(d2).map(|&v| v as f32).collect())
            .collect())
    }
}

/// Extracts feature slices from `waveform` sampled at `sample_rate`.
pub fn extract(waveform: &[f32], sample_rate: usize) -> Result<Vec<FeatureSlice>, FeatureError> {
    FeatureExtractor::new(sample_rate).extract(waveform)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(n: usize, seed: u32) -> Vec<f32> {
        // Small LCG so the test signal is broadband and reproducible.
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect()
    }

    #[test]
    fn slice_count_is_frames_minus_16() {
        let ex = FeatureExtractor::new(16000);
        let wav = noise(16000, 1);
        let frames = ex.frame_features(&wav).unwrap().len();
        let slices = ex.extract(&wav).unwrap();
        assert_eq!(frames, 99);
        assert_eq!(slices.len(), frames - 16);
        assert_eq!(slices.len(), ex.num_slices(wav.len()));
    }

    #[test]
    fn slice_count_8k() {
        let ex = FeatureExtractor::new(8000);
        let wav = noise(16000, 2);
        // 2 s at 8 kHz: 1 + ceil((16000 - 200) / 80) = 199 frames.
        assert_eq!(ex.extract(&wav).unwrap().len(), 199 - 16);
    }

    #[test]
    fn short_waveform_yields_no_slices() {
        let ex = FeatureExtractor::new(16000);
        // 16 frames exactly: 400 + 15 * 160 samples.
        let wav = noise(400 + 15 * 160, 3);
        assert_eq!(ex.frame_features(&wav).unwrap().len(), 16);
        assert!(ex.extract(&wav).unwrap().is_empty());
    }

    #[test]
    fn extract_empty_fails() {
        assert!(matches!(extract(&[], 16000), Err(FeatureError::EmptySignal)));
    }

    #[test]
    fn extract_is_deterministic() {
        let wav = noise(8000, 4);
        let a = extract(&wav, 16000).unwrap();
        let b = extract(&wav, 16000).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            let xb: Vec<u32> = x.as_slice().iter().map(|v| v.to_bits()).collect();
            let yb: Vec<u32> = y.as_slice().iter().map(|v| v.to_bits()).collect();
            assert_eq!(xb, yb);
        }
    }

    #[test]
    fn slices_slide_one_frame() {
        let ex = FeatureExtractor::new(16000);
        let wav = noise(8000, 5);
        let frames = ex.frame_features(&wav).unwrap();
        let slices = ex.extract(&wav).unwrap();

        assert_eq!(slices[0].frame(0), &frames[0][..]);
        assert_eq!(slices[0].frame(15), &frames[15][..]);
        assert_eq!(slices[1].frame(0), &frames[1][..]);
        assert_eq!(slices[slices.len() - 1].frame(15), &frames[frames.len() - 1][..]);
    }

    #[test]
    fn slice_reshape_is_row_major() {
        let ex = FeatureExtractor::new(16000);
        let slices = ex.extract(&noise(8000, 6)).unwrap();
        let s = &slices[0];
        assert_eq!(s.as_slice().len(), 32 * 32 * 3);
        // Flat index 200 = frame 1, feature 8; in (32, 32, 3) it is (2, 2, 2).
        assert_eq!(s.get(2, 2, 2), s.frame(1)[8]);
    }

    #[test]
    fn frames_are_normalized_per_block() {
        let ex = FeatureExtractor::new(16000);
        let frames = ex.frame_features(&noise(16000, 7)).unwrap();
        for frame in &frames {
            assert_eq!(frame.len(), FRAME_FEATURES);
            for block in frame.chunks_exact(NUM_FILTERS) {
                let n = block.len() as f64;
                let mean = block.iter().map(|&v| v as f64).sum::<f64>() / n;
                let std = (block.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n).sqrt();
                assert!(mean.abs() < 1e-4, "mean should be ~0, got {mean}");
                assert!((std - 1.0).abs() < 1e-3 || std < 1e-6, "std should be ~1 or ~0, got {std}");
            }
        }
    }

    #[test]
    fn silence_does_not_produce_nan() {
        let slices = extract(&vec![0.0; 16000], 16000).unwrap();
        assert_eq!(slices.len(), 83);
        assert!(slices.iter().all(|s| s.as_slice().iter().all(|v| v.is_finite())));
    }
}
