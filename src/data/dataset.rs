use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::data::error::{DecodeError, IdxKind};
use crate::data::idx::{self, Dims};

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Class labels in file order, one unsigned byte per example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<u8>,
}

impl LabelSet {
    pub fn new(labels: Vec<u8>) -> Self {
        LabelSet { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.labels.get(index).copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.labels
    }

    /// Number of examples per class value, indexed by label.
    ///
    /// The returned vector is just long enough to hold the largest label.
    pub fn class_counts(&self) -> Vec<usize> {
        let n_classes = self.labels.iter().max().map(|&m| m as usize + 1).unwrap_or(0);
        let mut counts = vec![0usize; n_classes];
        for &label in &self.labels {
            counts[label as usize] += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Raw grayscale images, stored contiguously in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSet {
    dims: Dims,
    pixels: Vec<u8>,
}

impl ImageSet {
    /// Caller guarantees `pixels.len()` is a multiple of `dims.pixels()`.
    pub(crate) fn new(dims: Dims, pixels: Vec<u8>) -> Self {
        ImageSet { dims, pixels }
    }

    /// Builds a set from raw pixels; `None` when the buffer does not split
    /// into whole images.
    pub fn from_raw(dims: Dims, pixels: Vec<u8>) -> Option<Self> {
        let per_image = dims.pixels();
        if per_image == 0 {
            return pixels.is_empty().then(|| ImageSet::new(dims, pixels));
        }
        if pixels.len() % per_image != 0 {
            return None;
        }
        Some(ImageSet::new(dims, pixels))
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn len(&self) -> usize {
        match self.dims.pixels() {
            0 => 0,
            n => self.pixels.len() / n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixels of image `index` as a flat `rows * cols` slice.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let n = self.dims.pixels();
        let start = index.checked_mul(n)?;
        self.pixels.get(start..start + n)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks_exact(self.dims.pixels().max(1))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Single-channel `f32` tensor of shape `(count, 1, rows, cols)`, each
    /// pixel divided by 255 so values lie in `[0.0, 1.0]`.
    pub fn normalized(&self) -> ImageTensor {
        ImageTensor {
            count: self.len(),
            dims: self.dims,
            data: self.pixels.iter().map(|&px| px as f32 / 255.0).collect(),
        }
    }
}

/// Normalized images ready for batching.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    count: usize,
    dims: Dims,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// `[count, 1, rows, cols]`.
    pub fn shape(&self) -> [usize; 4] {
        [self.count, 1, self.dims.rows, self.dims.cols]
    }

    pub fn item(&self, index: usize) -> Option<&[f32]> {
        let n = self.dims.pixels();
        let start = index.checked_mul(n)?;
        self.data.get(start..start + n)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// One split: labels paired with normalized images of the same length.
#[derive(Debug, Clone)]
pub struct Dataset {
    labels: LabelSet,
    images: ImageTensor,
}

impl Dataset {
    /// Pairs labels with images, rejecting sets of different lengths.
    pub fn new(labels: LabelSet, images: &ImageSet) -> Result<Self, DecodeError> {
        if labels.len() != images.len() {
            return Err(DecodeError::CountMismatch {
                labels: labels.len(),
                images: images.len(),
            });
        }
        Ok(Dataset {
            labels,
            images: images.normalized(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn images(&self) -> &ImageTensor {
        &self.images
    }
}

/// The two canonical MNIST splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Default `(labels, images)` file names of the split.
    pub fn file_names(&self) -> (&'static str, &'static str) {
        match self {
            Split::Train => ("train-labels-idx1-ubyte.gz", "train-images-idx3-ubyte.gz"),
            Split::Test => ("t10k-labels-idx1-ubyte.gz", "t10k-images-idx3-ubyte.gz"),
        }
    }

    pub fn paths(&self, dir: &Path) -> (PathBuf, PathBuf) {
        let (labels, images) = self.file_names();
        (dir.join(labels), dir.join(images))
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test => write!(f, "test"),
        }
    }
}

// ---------------------------------------------------------------------------
// File reading
// ---------------------------------------------------------------------------

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
}

/// Reads a whole IDX file into memory, gunzipping it when the name ends in `.gz`.
fn read_file(path: &Path, kind: IdxKind) -> Result<Vec<u8>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::FileAccess {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    let mut bytes = Vec::new();
    if is_gzip(path) {
        GzDecoder::new(BufReader::new(file))
            .read_to_end(&mut bytes)
            .map_err(|source| DecodeError::Decompression {
                kind,
                path: path.to_path_buf(),
                source,
            })?;
    } else {
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(|source| DecodeError::FileAccess {
                kind,
                path: path.to_path_buf(),
                source,
            })?;
    }
    log::debug!("read {} bytes from '{}'", bytes.len(), path.display());
    Ok(bytes)
}

pub fn read_labels(path: impl AsRef<Path>) -> Result<LabelSet, DecodeError> {
    let bytes = read_file(path.as_ref(), IdxKind::Labels)?;
    idx::decode_labels(&bytes)
}

pub fn read_images(path: impl AsRef<Path>, expected: Dims) -> Result<ImageSet, DecodeError> {
    let bytes = read_file(path.as_ref(), IdxKind::Images)?;
    idx::decode_images(&bytes, expected)
}

/// Loads one split from a label file and an image file of 28×28 digits.
pub fn read_data(
    label_path: impl AsRef<Path>,
    image_path: impl AsRef<Path>,
) -> Result<Dataset, DecodeError> {
    read_data_with_dims(label_path, image_path, Dims::MNIST)
}

/// Like [`read_data`] for datasets whose images are not 28×28.
pub fn read_data_with_dims(
    label_path: impl AsRef<Path>,
    image_path: impl AsRef<Path>,
    expected: Dims,
) -> Result<Dataset, DecodeError> {
    let labels = read_labels(label_path)?;
    let images = read_images(image_path, expected)?;
    Dataset::new(labels, &images)
}
