use deepspeaker_features::{FeatureExtractor, FeatureSlice, SLICE_LEN};
use rand::Rng;
use tracing::debug;

use crate::align::align_waveforms;
use crate::corpus::{CorpusIndex, UtteranceRecord};
use crate::error::TripletError;
use crate::loader::AudioLoader;
use crate::sampler::{sample_triplets, Triplet};
use crate::tensor::TrainingTensor;

/// Upper bound on `truncate_seconds`.
pub const MAX_TRUNCATE_SECONDS: f64 = 600.0;

/// Configures batch construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Sample rate of the corpus audio, 8000 or 16000 Hz (default: 16000).
    pub sample_rate: u32,
    /// Seconds of audio kept per utterance (default: 1, at most
    /// [`MAX_TRUNCATE_SECONDS`]).
    pub truncate_seconds: f64,
    /// Triplets per batch (default: 6). A batch holds 3x as many items.
    pub num_triplets: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            truncate_seconds: 1.0,
            num_triplets: 6,
        }
    }
}

impl BatchConfig {
    /// Samples every waveform is aligned to: `truncate_seconds x sample_rate`.
    pub fn global_target_length(&self) -> usize {
        (self.truncate_seconds * self.sample_rate as f64).round() as usize
    }

    /// Number of items in a batch (3N).
    pub fn batch_items(&self) -> usize {
        self.num_triplets * 3
    }

    pub fn validate(&self) -> Result<(), TripletError> {
        if self.sample_rate != 8000 && self.sample_rate != 16000 {
            return Err(TripletError::InvalidConfig(format!(
                "sample rate must be 8000 or 16000, got {}",
                self.sample_rate
            )));
        }
        if !(self.truncate_seconds > 0.0 && self.truncate_seconds <= MAX_TRUNCATE_SECONDS) {
            return Err(TripletError::InvalidConfig(format!(
                "truncate_seconds must be in (0, {MAX_TRUNCATE_SECONDS}], got {}",
                self.truncate_seconds
            )));
        }
        if self.num_triplets == 0 {
            return Err(TripletError::InvalidConfig("num_triplets must be at least 1".into()));
        }
        Ok(())
    }
}

/// Panics unless `records` is laid out as anchor, positive and negative
/// blocks of `n` records with matching anchor/positive speakers and a
/// different speaker for every negative.
///
/// A failure means the sampler produced an invalid batch.
pub fn verify_triplet_identity(records: &[UtteranceRecord], n: usize) {
    assert_eq!(records.len(), 3 * n, "triplet: batch must hold 3 x {n} records");
    let (anchors, rest) = records.split_at(n);
    let (positives, negatives) = rest.split_at(n);
    for i in 0..n {
        assert_eq!(
            anchors[i].speaker_id, positives[i].speaker_id,
            "triplet: anchor/positive speaker mismatch at {i}"
        );
        assert_ne!(
            anchors[i].speaker_id, negatives[i].speaker_id,
            "triplet: negative shares the anchor speaker at {i}"
        );
    }
}

/// A batch of `N` triplets laid out as `[anchors | positives | negatives]`.
///
/// The block order is what the loss relies on and never changes once the
/// batch is built.
#[derive(Debug, Clone)]
pub struct Batch {
    num_triplets: usize,
    records: Vec<UtteranceRecord>,
    aligned_len: Option<usize>,
    slices: Vec<Vec<FeatureSlice>>,
}

impl Batch {
    /// Lays out sampled triplets into the three blocks.
    pub fn from_triplets(triplets: Vec<Triplet>) -> Self {
        let n = triplets.len();
        let mut anchors = Vec::with_capacity(3 * n);
        let mut positives = Vec::with_capacity(n);
        let mut negatives = Vec::with_capacity(n);
        for t in triplets {
            anchors.push(t.anchor);
            positives.push(t.positive);
            negatives.push(t.negative);
        }
        let mut records = anchors;
        records.append(&mut positives);
        records.append(&mut negatives);

        verify_triplet_identity(&records, n);
        Self {
            num_triplets: n,
            records,
            aligned_len: None,
            slices: Vec::new(),
        }
    }

    pub fn num_triplets(&self) -> usize {
        self.num_triplets
    }

    /// All 3N records in block order.
    pub fn records(&self) -> &[UtteranceRecord] {
        &self.records
    }

    pub fn anchors(&self) -> &[UtteranceRecord] {
        &self.records[..self.num_triplets]
    }

    pub fn positives(&self) -> &[UtteranceRecord] {
        &self.records[self.num_triplets..2 * self.num_triplets]
    }

    pub fn negatives(&self) -> &[UtteranceRecord] {
        &self.records[2 * self.num_triplets..]
    }

    /// Speaker of every item in block order.
    pub fn speaker_ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.speaker_id.as_str()).collect()
    }

    /// Whether audio has been loaded and featurized.
    pub fn is_loaded(&self) -> bool {
        !self.slices.is_empty()
    }

    /// Sample count every waveform was aligned to.
    pub fn aligned_len(&self) -> Option<usize> {
        self.aligned_len
    }

    /// Slice sequence of each item, in block order.
    pub fn slices(&self) -> &[Vec<FeatureSlice>] {
        &self.slices
    }

    /// Slice count per item, if loaded.
    pub fn num_slices(&self) -> Option<usize> {
        self.slices.first().map(Vec::len)
    }

    /// Flattens the loaded slices into a `(3N x S, 32, 32, 3)` tensor.
    pub fn to_tensor(&self) -> Result<TrainingTensor, TripletError> {
        let per_item = self.num_slices().ok_or(TripletError::NotLoaded)?;
        for item in &self.slices {
            if item.len() != per_item {
                return Err(TripletError::ShapeMismatch {
                    expected: per_item,
                    got: item.len(),
                });
            }
        }
        verify_triplet_identity(&self.records, self.num_triplets);

        let mut data = Vec::with_capacity(self.slices.len() * per_item * SLICE_LEN);
        for slice in self.slices.iter().flatten() {
            data.extend_from_slice(slice.as_slice());
        }
        Ok(TrainingTensor::new(data, self.slices.len(), per_item))
    }
}

/// Holds the slice count fixed for a training run.
///
/// The network input shape depends on it, so every batch after the first
/// must produce exactly the same count.
#[derive(Debug, Clone, Default)]
pub struct SlicePin {
    expected: Option<usize>,
}

impl SlicePin {
    /// A pin that takes its value from the first checked batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pin fixed to `slices` up front.
    pub fn fixed(slices: usize) -> Self {
        Self { expected: Some(slices) }
    }

    pub fn get(&self) -> Option<usize> {
        self.expected
    }

    /// Checks `got` against the pinned count, pinning it if unset.
    pub fn check(&mut self, got: usize) -> Result<usize, TripletError> {
        match self.expected {
            None => {
                self.expected = Some(got);
                Ok(got)
            }
            Some(expected) if expected == got => Ok(got),
            Some(expected) => Err(TripletError::ShapeMismatch { expected, got }),
        }
    }
}

/// Samples triplets, loads their audio and turns it into feature slices.
pub struct BatchBuilder<L> {
    cfg: BatchConfig,
    loader: L,
    extractor: FeatureExtractor,
}

impl<L: AudioLoader> BatchBuilder<L> {
    /// Creates a builder. Fails if the configuration is invalid, the loader
    /// runs at another sample rate, or the alignment window is too short to
    /// yield a single slice.
    pub fn new(cfg: BatchConfig, loader: L) -> Result<Self, TripletError> {
        cfg.validate()?;
        if loader.sample_rate() != cfg.sample_rate {
            return Err(TripletError::InvalidConfig(format!(
                "loader sample rate {} Hz does not match {} Hz",
                loader.sample_rate(),
                cfg.sample_rate
            )));
        }
        let extractor = FeatureExtractor::new(cfg.sample_rate as usize);
        if extractor.num_slices(cfg.global_target_length()) == 0 {
            return Err(TripletError::InvalidConfig(format!(
                "{}s of audio is too short for one feature slice",
                cfg.truncate_seconds
            )));
        }
        Ok(Self { cfg, loader, extractor })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.cfg
    }

    /// Slice count per item for a full-length aligned waveform.
    pub fn expected_slices(&self) -> usize {
        self.extractor.num_slices(self.cfg.global_target_length())
    }

    /// Draws the triplets of a new batch without loading audio.
    pub fn sample<R: Rng + ?Sized>(&self, corpus: &CorpusIndex, rng: &mut R) -> Result<Batch, TripletError> {
        let triplets = sample_triplets(corpus, self.cfg.num_triplets, rng)?;
        Ok(Batch::from_triplets(triplets))
    }

    /// Loads, aligns and featurizes every item of `batch`.
    pub fn load(&self, batch: &mut Batch) -> Result<(), TripletError> {
        let mut waveforms = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            let samples = self.loader.read(&record.file)?;
            if samples.is_empty() {
                return Err(TripletError::EmptyAudio { path: record.file.clone() });
            }
            waveforms.push(samples);
        }

        let aligned = align_waveforms(&mut waveforms, self.cfg.global_target_length());

        let mut slices = Vec::with_capacity(waveforms.len());
        for w in &waveforms {
            slices.push(self.extractor.extract(w)?);
        }

        debug!(
            "loaded batch: items={}, aligned_len={}, slices_per_item={}",
            waveforms.len(),
            aligned,
            slices.first().map_or(0, Vec::len)
        );
        batch.aligned_len = Some(aligned);
        batch.slices = slices;
        Ok(())
    }

    /// Samples and loads a batch.
    pub fn build<R: Rng + ?Sized>(&self, corpus: &CorpusIndex, rng: &mut R) -> Result<Batch, TripletError> {
        let mut batch = self.sample(corpus, rng)?;
        self.load(&mut batch)?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    /// Serves synthetic waveforms whose length depends on the file.
    struct MemoryLoader {
        sample_rate: u32,
        audio: HashMap<PathBuf, Vec<f32>>,
    }

    impl AudioLoader for MemoryLoader {
        fn read(&self, path: &Path) -> Result<Vec<f32>, TripletError> {
            self.audio.get(path).cloned().ok_or_else(|| TripletError::AudioUnavailable {
                path: path.to_path_buf(),
                reason: "not found".into(),
            })
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
    }

    fn tone(freq: f32, len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * freq * 0.001).sin() * 0.3).collect()
    }

    fn fixture(speakers: usize, per_speaker: usize) -> (CorpusIndex, MemoryLoader) {
        let mut records = Vec::new();
        let mut audio = HashMap::new();
        for s in 0..speakers {
            for u in 0..per_speaker {
                let file = PathBuf::from(format!("{s}/1/{s}-1-{u:04}.wav"));
                // Lengths from 0.3s to well past the 1s window.
                let len = 4800 + (s * 7 + u * 13) % 5 * 6000;
                audio.insert(file.clone(), tone(50.0 + s as f32 * 20.0 + u as f32, len));
                records.push(UtteranceRecord::new(file, s.to_string(), "1"));
            }
        }
        (CorpusIndex::new(records), MemoryLoader { sample_rate: 16000, audio })
    }

    #[test]
    fn config_defaults() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.global_target_length(), 16000);
        assert_eq!(cfg.batch_items(), 18);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_values() {
        let bad_rate = BatchConfig { sample_rate: 44100, ..Default::default() };
        assert!(bad_rate.validate().is_err());
        let bad_window = BatchConfig { truncate_seconds: 0.0, ..Default::default() };
        assert!(bad_window.validate().is_err());
        let no_triplets = BatchConfig { num_triplets: 0, ..Default::default() };
        assert!(no_triplets.validate().is_err());

        for secs in [f64::INFINITY, f64::NAN, 1e12, MAX_TRUNCATE_SECONDS + 1.0] {
            let cfg = BatchConfig { truncate_seconds: secs, ..Default::default() };
            assert!(matches!(cfg.validate(), Err(TripletError::InvalidConfig(_))), "accepted {secs}");
        }
        let longest = BatchConfig { truncate_seconds: MAX_TRUNCATE_SECONDS, ..Default::default() };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn builder_rejects_unbounded_window() {
        let (_, loader) = fixture(2, 2);
        let cfg = BatchConfig { truncate_seconds: f64::INFINITY, ..Default::default() };
        assert!(matches!(BatchBuilder::new(cfg, loader), Err(TripletError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_window_without_slices() {
        let (_, loader) = fixture(2, 2);
        let cfg = BatchConfig { truncate_seconds: 0.1, ..Default::default() };
        assert!(matches!(BatchBuilder::new(cfg, loader), Err(TripletError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_loader_rate_mismatch() {
        let (_, mut loader) = fixture(2, 2);
        loader.sample_rate = 8000;
        assert!(BatchBuilder::new(BatchConfig::default(), loader).is_err());
    }

    #[test]
    fn batch_blocks_keep_identity() {
        let (corpus, loader) = fixture(5, 3);
        let builder = BatchBuilder::new(BatchConfig::default(), loader).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let batch = builder.sample(&corpus, &mut rng).unwrap();
            let n = batch.num_triplets();
            let ids = batch.speaker_ids();
            assert_eq!(ids.len(), 3 * n);
            assert_eq!(ids[..n], ids[n..2 * n]);
            for i in 0..n {
                assert_ne!(ids[i], ids[2 * n + i]);
            }
        }
    }

    #[test]
    fn build_produces_aligned_tensor() {
        let (corpus, loader) = fixture(4, 3);
        let cfg = BatchConfig { num_triplets: 3, ..Default::default() };
        let builder = BatchBuilder::new(cfg, loader).unwrap();
        let batch = builder.build(&corpus, &mut StdRng::seed_from_u64(9)).unwrap();

        assert_eq!(batch.aligned_len(), Some(16000));
        let per_item = batch.num_slices().unwrap();
        assert_eq!(per_item, builder.expected_slices());
        assert_eq!(per_item, 83);

        let tensor = batch.to_tensor().unwrap();
        assert_eq!(tensor.shape(), [9 * 83, 32, 32, 3]);
        assert_eq!(tensor.num_items(), 9);

        // Item 4 is the second positive; its slices are contiguous rows.
        let expected: Vec<f32> = batch.slices()[4].iter().flat_map(|s| s.as_slice().to_vec()).collect();
        assert_eq!(tensor.item(4), &expected[..]);
        assert_eq!(tensor.row(4 * 83), batch.slices()[4][0].as_slice());
    }

    #[test]
    fn tensor_requires_loaded_audio() {
        let (corpus, loader) = fixture(3, 2);
        let builder = BatchBuilder::new(BatchConfig::default(), loader).unwrap();
        let batch = builder.sample(&corpus, &mut StdRng::seed_from_u64(2)).unwrap();
        assert!(matches!(batch.to_tensor(), Err(TripletError::NotLoaded)));
    }

    #[test]
    fn missing_audio_fails_the_batch() {
        let (corpus, mut loader) = fixture(2, 2);
        loader.audio.clear();
        let builder = BatchBuilder::new(BatchConfig::default(), loader).unwrap();
        let err = builder.build(&corpus, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(err.is_audio_unavailable());
    }

    #[test]
    fn empty_audio_fails_the_batch() {
        let (corpus, mut loader) = fixture(2, 2);
        for w in loader.audio.values_mut() {
            w.clear();
        }
        let builder = BatchBuilder::new(BatchConfig::default(), loader).unwrap();
        let err = builder.build(&corpus, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, TripletError::EmptyAudio { .. }));
    }

    #[test]
    fn single_speaker_corpus_fails() {
        let (corpus, loader) = fixture(1, 4);
        let builder = BatchBuilder::new(BatchConfig::default(), loader).unwrap();
        let err = builder.build(&corpus, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(err.is_data_scarcity());
    }

    #[test]
    fn slice_pin_detects_drift() {
        let mut pin = SlicePin::new();
        assert_eq!(pin.check(83).unwrap(), 83);
        assert_eq!(pin.check(83).unwrap(), 83);
        assert!(matches!(
            pin.check(84),
            Err(TripletError::ShapeMismatch { expected: 83, got: 84 })
        ));
        assert!(SlicePin::fixed(10).check(9).is_err());
    }

    #[test]
    #[should_panic(expected = "anchor/positive speaker mismatch")]
    fn identity_check_panics_on_mismatch() {
        let records = vec![
            UtteranceRecord::new("a0", "a", "1"),
            UtteranceRecord::new("b0", "b", "1"),
            UtteranceRecord::new("c0", "c", "1"),
        ];
        verify_triplet_identity(&records, 1);
    }

    #[test]
    #[should_panic(expected = "negative shares the anchor speaker")]
    fn identity_check_panics_on_same_negative() {
        let records = vec![
            UtteranceRecord::new("a0", "a", "1"),
            UtteranceRecord::new("a1", "a", "1"),
            UtteranceRecord::new("a2", "a", "1"),
        ];
        verify_triplet_identity(&records, 1);
    }
}
