use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::callback::fit::FitConfig;
use crate::data::dataset::Split;
use crate::data::idx::{Dims, MNIST_SIDE};
use crate::data::iter::LastBatch;
use crate::error::{Error, Result};
use crate::summary::png;

/// Everything the `mnist-board` binary needs: where the data lives, how to
/// batch it, where summaries go and how the run is fitted.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub data_dir: PathBuf,
    pub train_labels: String,
    pub train_images: String,
    pub test_labels: String,
    pub test_images: String,
    /// `[rows, cols]` every image file must declare.
    pub image_dims: [usize; 2],

    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
    pub last_batch: LastBatch,

    pub logdir: PathBuf,
    /// Records buffered before the sink writes to disk.
    pub sync_cycle: usize,
    pub mode: String,
    pub scalar_tag: String,
    pub image_tag: String,
    pub histogram_tag: String,
    pub image_samples: usize,
    pub num_buckets: usize,
    /// Epoch-end parameter rendered as image and histogram.
    pub image_param: String,
    pub image_shape: Vec<usize>,
    /// Batches between progress log lines; `0` disables them.
    pub log_every: usize,

    pub fit: FitConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let (train_labels, train_images) = Split::Train.file_names();
        let (test_labels, test_images) = Split::Test.file_names();
        BoardConfig {
            data_dir: PathBuf::from("data"),
            train_labels: train_labels.into(),
            train_images: train_images.into(),
            test_labels: test_labels.into(),
            test_images: test_images.into(),
            image_dims: [MNIST_SIDE, MNIST_SIDE],
            batch_size: 100,
            shuffle: true,
            seed: None,
            last_batch: LastBatch::Pad,
            logdir: PathBuf::from("./log"),
            sync_cycle: 10,
            mode: "train".into(),
            scalar_tag: "scalars/scalar0".into(),
            image_tag: "images/image0".into(),
            histogram_tag: "histogram/histogram0".into(),
            image_samples: 1,
            num_buckets: 100,
            image_param: "pixel_mean".into(),
            image_shape: vec![MNIST_SIDE, MNIST_SIDE],
            log_every: 100,
            fit: FitConfig::default(),
        }
    }
}

impl BoardConfig {
    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a config from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<BoardConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: BoardConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.sync_cycle == 0 {
            return Err(Error::Config("sync_cycle must be at least 1".into()));
        }
        if self.num_buckets == 0 {
            return Err(Error::Config("num_buckets must be at least 1".into()));
        }
        if self.image_dims.contains(&0) {
            return Err(Error::Config(format!(
                "image_dims must have positive sides, got {:?}",
                self.image_dims
            )));
        }
        if !png::is_image_shape(&self.image_shape) || self.image_shape.contains(&0) {
            return Err(Error::Config(format!(
                "image_shape must be [rows, cols] or [rows, cols, 1] with positive sides, got {:?}",
                self.image_shape
            )));
        }
        if self.mode.is_empty() {
            return Err(Error::Config("mode must not be empty".into()));
        }
        Ok(())
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.image_dims[0], self.image_dims[1])
    }

    /// `(labels, images)` paths of `split` under `data_dir`.
    pub fn split_paths(&self, split: Split) -> (PathBuf, PathBuf) {
        let (labels, images) = match split {
            Split::Train => (&self.train_labels, &self.train_images),
            Split::Test => (&self.test_labels, &self.test_images),
        };
        (self.data_dir.join(labels), self.data_dir.join(images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: BoardConfig =
            serde_json::from_str(r#"{ "batch_size": 64, "fit": { "num_epoch": 5 } }"#).unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.fit.num_epoch, 5);
        assert_eq!(config.fit.optimizer, "sgd");
        assert_eq!(config.sync_cycle, 10);
        assert_eq!(config.last_batch, LastBatch::Pad);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        let config = BoardConfig {
            seed: Some(42),
            last_batch: LastBatch::Discard,
            ..BoardConfig::default()
        };
        config.save_json(&path).unwrap();
        assert_eq!(BoardConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn validate_rejects_zeroes() {
        let bad = BoardConfig { batch_size: 0, ..BoardConfig::default() };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
        let bad = BoardConfig { image_shape: vec![28, 0], ..BoardConfig::default() };
        assert!(bad.validate().is_err());
        let bad = BoardConfig { image_dims: [0, 28], ..BoardConfig::default() };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
        assert!(BoardConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unrenderable_image_shape() {
        let flat = BoardConfig { image_shape: vec![784], ..BoardConfig::default() };
        assert!(matches!(flat.validate(), Err(Error::Config(_))));
        let rgb = BoardConfig { image_shape: vec![28, 28, 3], ..BoardConfig::default() };
        assert!(rgb.validate().is_err());
        let channel = BoardConfig { image_shape: vec![28, 28, 1], ..BoardConfig::default() };
        assert!(channel.validate().is_ok());
    }

    #[test]
    fn split_paths_use_configured_names() {
        let config = BoardConfig { data_dir: PathBuf::from("/mnist"), ..BoardConfig::default() };
        let (labels, images) = config.split_paths(Split::Train);
        assert_eq!(labels, Path::new("/mnist/train-labels-idx1-ubyte.gz"));
        assert_eq!(images, Path::new("/mnist/train-images-idx3-ubyte.gz"));
    }
}
