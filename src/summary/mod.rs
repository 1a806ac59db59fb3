pub mod histogram;
pub mod png;
pub mod record;
pub mod sink;
pub mod writer;

pub use histogram::{Bucket, Histogram};
pub use record::{Entry, ImageSample, Record};
pub use sink::{JsonlSink, MemorySink, SharedSink, SummarySink};
pub use writer::{HistogramWriter, ImageWriter, LogWriter, ModeScope, ScalarWriter};
