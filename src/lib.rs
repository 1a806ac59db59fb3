pub mod callback;
pub mod config;
pub mod data;
pub mod error;
pub mod summary;

// Convenience re-exports
pub use callback::{
    Callbacks, DatasetPass, FitConfig, ImageHistogramCallback, ScalarCallback, Trainer,
};
pub use config::BoardConfig;
pub use data::{read_data, BatchIter, Dataset, DecodeError, Dims, ImageSet, LabelSet, Split};
pub use error::{Error, Result};
pub use summary::{LogWriter, SummarySink};
