use crate::data::error::DecodeError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Image writer used out of its start/add/finish order.
    #[error("image sampling: {0}")]
    Sampling(String),

    #[error("parameter '{0}' not found")]
    MissingParam(String),

    #[error("parameter '{name}' has {actual} values, shape {shape:?} needs {expected}")]
    ShapeMismatch {
        name: String,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("summary sink lock poisoned")]
    SinkPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
