use deepspeaker_features::{SLICE_LEN, SLICE_SHAPE};

/// Flattened network input of one batch.
///
/// Shape is `(3N x S, 32, 32, 3)` where `S` is the slice count per item.
/// Rows are laid out item by item, in batch order (anchors, positives,
/// negatives), each item contributing `S` consecutive slices.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTensor {
    data: Vec<f32>,
    shape: [usize; 4],
    slices_per_item: usize,
}

impl TrainingTensor {
    /// Wraps `num_items x slices_per_item` flattened slices.
    pub fn new(data: Vec<f32>, num_items: usize, slices_per_item: usize) -> Self {
        let rows = num_items * slices_per_item;
        assert_eq!(data.len(), rows * SLICE_LEN, "triplet: tensor data does not match its shape");
        Self {
            data,
            shape: [rows, SLICE_SHAPE[0], SLICE_SHAPE[1], SLICE_SHAPE[2]],
            slices_per_item,
        }
    }

    /// `[rows, 32, 32, 3]`.
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Leading dimension: number of slices in the batch.
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn slices_per_item(&self) -> usize {
        self.slices_per_item
    }

    /// Number of batch items (3N).
    pub fn num_items(&self) -> usize {
        if self.slices_per_item == 0 {
            0
        } else {
            self.rows() / self.slices_per_item
        }
    }

    /// Flat row-major data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// One (32, 32, 3) slice.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * SLICE_LEN..(i + 1) * SLICE_LEN]
    }

    /// All slices of batch item `item`.
    pub fn item(&self, item: usize) -> &[f32] {
        let span = self.slices_per_item * SLICE_LEN;
        &self.data[item * span..(item + 1) * span]
    }
}
