use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::Dataset;
use crate::data::idx::Dims;
use crate::error::{Error, Result};

/// What to do with the examples left over when the dataset length is not a
/// multiple of the batch size.
///
/// - `Pad`: fill the last batch by wrapping around to the start of the epoch
///   order. `Batch::pad` counts the filler examples.
/// - `Discard`: drop the short last batch.
/// - `Keep`: return the short last batch as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastBatch {
    #[default]
    Pad,
    Discard,
    Keep,
}

/// One group of examples handed to the trainer.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Flat `f32` pixels of shape `(len, 1, rows, cols)`.
    pub data: Vec<f32>,
    pub labels: Vec<u8>,
    /// Dataset indices of the examples, in batch order.
    pub indices: Vec<usize>,
    /// Trailing examples that were wrapped in to fill the batch.
    pub pad: usize,
    dims: Dims,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.len(), 1, self.dims.rows, self.dims.cols]
    }

    pub fn item(&self, index: usize) -> Option<&[f32]> {
        let n = self.dims.pixels();
        let start = index.checked_mul(n)?;
        self.data.get(start..start + n)
    }
}

/// Iterates a [`Dataset`] in fixed-size batches, optionally reshuffled every
/// epoch.
///
/// The iterator yields one epoch; call [`BatchIter::reset`] to start the next.
pub struct BatchIter<'a> {
    dataset: &'a Dataset,
    batch_size: usize,
    shuffle: bool,
    last_batch: LastBatch,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl<'a> BatchIter<'a> {
    /// Sequential iterator with `LastBatch::Pad`.
    pub fn new(dataset: &'a Dataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        Ok(BatchIter {
            dataset,
            batch_size,
            shuffle: false,
            last_batch: LastBatch::Pad,
            order: (0..dataset.len()).collect(),
            cursor: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Turns on per-epoch shuffling. A fixed `seed` makes the order reproducible.
    pub fn with_shuffle(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.reset();
        self
    }

    pub fn with_last_batch(mut self, last_batch: LastBatch) -> Self {
        self.last_batch = last_batch;
        self
    }

    /// Rewinds to the start of a new epoch, drawing a fresh order if shuffling.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }

    /// Batches per epoch under the current last-batch policy.
    pub fn num_batches(&self) -> usize {
        let n = self.order.len();
        match self.last_batch {
            LastBatch::Discard => n / self.batch_size,
            LastBatch::Pad | LastBatch::Keep => n.div_ceil(self.batch_size),
        }
    }

    fn gather(&self, indices: Vec<usize>, pad: usize) -> Batch {
        let images = self.dataset.images();
        let labels = self.dataset.labels().as_slice();
        let dims = images.dims();
        let n = dims.pixels();

        let mut data = Vec::with_capacity(indices.len() * n);
        let mut batch_labels = Vec::with_capacity(indices.len());
        for &idx in &indices {
            data.extend_from_slice(&images.as_slice()[idx * n..(idx + 1) * n]);
            batch_labels.push(labels[idx]);
        }
        Batch {
            data,
            labels: batch_labels,
            indices,
            pad,
            dims,
        }
    }
}

impl Iterator for BatchIter<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let n = self.order.len();
        if self.cursor >= n {
            return None;
        }
        let end = self.cursor + self.batch_size;

        if end <= n {
            let indices = self.order[self.cursor..end].to_vec();
            self.cursor = end;
            return Some(self.gather(indices, 0));
        }

        // Short final batch.
        let mut indices = self.order[self.cursor..].to_vec();
        self.cursor = n;
        match self.last_batch {
            LastBatch::Discard => None,
            LastBatch::Keep => Some(self.gather(indices, 0)),
            LastBatch::Pad => {
                let pad = end - n;
                indices.extend(self.order.iter().cycle().take(pad));
                Some(self.gather(indices, pad))
            }
        }
    }
}
