use std::io::{BufReader, BufWriter, Read, Write};

use deepspeaker_features::SLICE_LEN;
use deepspeaker_triplet::TrainingTensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::TrainError;
use crate::loss::triplet_loss;

/// A speaker embedding network trained on triplet batches.
///
/// The input tensor is `(3N x S, 32, 32, 3)` with items in
/// `[anchors | positives | negatives]` order, `S` slices each.
/// `targets` holds one unused value per row.
pub trait SpeakerModel {
    /// Runs one optimization step and returns the batch loss.
    fn train_on_batch(&mut self, x: &TrainingTensor, targets: &[f32]) -> Result<f32, TrainError>;

    /// Writes the full parameter state.
    fn save(&self, w: &mut dyn Write) -> Result<(), TrainError>;

    /// Replaces the parameter state with one written by [`SpeakerModel::save`].
    fn load(&mut self, r: &mut dyn Read) -> Result<(), TrainError>;
}

/// Binary format magic and version.
const MODEL_MAGIC: [u8; 4] = [b'D', b'S', b'P', b'K'];
const MODEL_VERSION: u32 = 1;

/// Reference [`SpeakerModel`]: a fixed random linear projection.
///
/// Each item is embedded as `W * mean(slices)`, L2-normalized, and scored
/// with [`triplet_loss`]. The projection rows are random unit vectors drawn
/// from a seed. Weights are never updated: gradient optimization belongs to
/// a real network backend plugged in through [`SpeakerModel`].
///
/// # Checkpoint format
///
/// ```text
/// [4B magic "DSPK"] [4B version=1] [4B dim] [4B input_len]
/// [dim x input_len x 4B f32 weights, row-major]
/// ```
///
/// All multi-byte values are little-endian.
pub struct ProjectionModel {
    dim: usize,
    alpha: f32,
    weights: Vec<f32>,
}

impl ProjectionModel {
    /// Creates a projection to `dim` dimensions with rows drawn from `seed`.
    pub fn new(dim: usize, alpha: f32, seed: u64) -> Self {
        assert!(dim > 0, "train: embedding dim must be positive");
        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = Vec::with_capacity(dim * SLICE_LEN);
        for _ in 0..dim {
            let mut row: Vec<f32> = (0..SLICE_LEN).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            let norm = row.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>().sqrt();
            if norm > 0.0 {
                let scale = (1.0 / norm) as f32;
                for v in &mut row {
                    *v *= scale;
                }
            }
            weights.extend_from_slice(&row);
        }
        Self { dim, alpha, weights }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embeds every item of `x`, in item order.
    pub fn embed(&self, x: &TrainingTensor) -> Vec<Vec<f32>> {
        let per_item = x.slices_per_item();
        (0..x.num_items())
            .map(|item| {
                let mut mean = vec![0.0f32; SLICE_LEN];
                for slice in x.item(item).chunks_exact(SLICE_LEN) {
                    for (m, &v) in mean.iter_mut().zip(slice) {
                        *m += v;
                    }
                }
                for m in &mut mean {
                    *m /= per_item as f32;
                }

                let mut emb: Vec<f32> = self
                    .weights
                    .chunks_exact(SLICE_LEN)
                    .map(|row| row.iter().zip(&mean).map(|(w, v)| w * v).sum())
                    .collect();
                l2_normalize(&mut emb);
                emb
            })
            .collect()
    }
}

impl SpeakerModel for ProjectionModel {
    fn train_on_batch(&mut self, x: &TrainingTensor, targets: &[f32]) -> Result<f32, TrainError> {
        if targets.len() != x.rows() {
            return Err(TrainError::Model(format!(
                "targets length {} does not match {} rows",
                targets.len(),
                x.rows()
            )));
        }
        let items = x.num_items();
        if items == 0 || items % 3 != 0 {
            return Err(TrainError::Model(format!("batch of {items} items is not a triplet layout")));
        }
        let embeddings = self.embed(x);
        Ok(triplet_loss(&embeddings, items / 3, self.alpha))
    }

    fn save(&self, w: &mut dyn Write) -> Result<(), TrainError> {
        let mut bw = BufWriter::new(w);
        let write_err = |e: std::io::Error| TrainError::Io(e.to_string());

        bw.write_all(&MODEL_MAGIC).map_err(write_err)?;
        bw.write_all(&MODEL_VERSION.to_le_bytes()).map_err(write_err)?;
        bw.write_all(&(self.dim as u32).to_le_bytes()).map_err(write_err)?;
        bw.write_all(&(SLICE_LEN as u32).to_le_bytes()).map_err(write_err)?;
        for &v in &self.weights {
            bw.write_all(&v.to_le_bytes()).map_err(write_err)?;
        }
        bw.flush().map_err(write_err)?;
        Ok(())
    }

    fn load(&mut self, r: &mut dyn Read) -> Result<(), TrainError> {
        let mut br = BufReader::new(r);
        let read_err = |e: std::io::Error| TrainError::Io(e.to_string());
        let mut buf4 = [0u8; 4];

        br.read_exact(&mut buf4).map_err(read_err)?;
        if buf4 != MODEL_MAGIC {
            return Err(TrainError::InvalidFormat(format!("invalid magic {buf4:?}")));
        }
        br.read_exact(&mut buf4).map_err(read_err)?;
        let version = u32::from_le_bytes(buf4);
        if version != MODEL_VERSION {
            return Err(TrainError::InvalidFormat(format!("unsupported version {version}")));
        }
        br.read_exact(&mut buf4).map_err(read_err)?;
        let dim = u32::from_le_bytes(buf4) as usize;
        br.read_exact(&mut buf4).map_err(read_err)?;
        let input_len = u32::from_le_bytes(buf4) as usize;
        if dim != self.dim || input_len != SLICE_LEN {
            return Err(TrainError::InvalidFormat(format!(
                "shape {dim}x{input_len}, expected {}x{SLICE_LEN}",
                self.dim
            )));
        }

        let mut weights = Vec::with_capacity(dim * input_len);
        for _ in 0..dim * input_len {
            br.read_exact(&mut buf4).map_err(read_err)?;
            weights.push(f32::from_le_bytes(buf4));
        }
        self.weights = weights;
        Ok(())
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let scale = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
}
