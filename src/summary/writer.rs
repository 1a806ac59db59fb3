use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::summary::histogram::Histogram;
use crate::summary::png;
use crate::summary::record::{Entry, ImageSample, Record};
use crate::summary::sink::{JsonlSink, SharedSink};

fn emit(sink: &SharedSink, entry: Entry) -> Result<()> {
    sink.lock().map_err(|_| Error::SinkPoisoned)?.write(entry)
}

/// Entry point for writing summaries.
///
/// ```no_run
/// # fn main() -> mnist_board::Result<()> {
/// let writer = mnist_board::LogWriter::create("./log", 10)?;
/// let train = writer.mode("train");
/// let scalar = train.scalar("scalars/scalar0");
/// scalar.add_record(0, 0.25)?;
/// writer.flush()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LogWriter {
    sink: SharedSink,
}

impl LogWriter {
    /// Writes JSON lines under `logdir`, syncing every `sync_cycle` records.
    pub fn create(logdir: impl AsRef<Path>, sync_cycle: usize) -> Result<Self> {
        let sink = JsonlSink::create(logdir, sync_cycle)?;
        Ok(LogWriter::with_sink(Arc::new(Mutex::new(sink))))
    }

    pub fn with_sink(sink: SharedSink) -> Self {
        LogWriter { sink }
    }

    /// Handle factory for records of one mode (e.g. `"train"`).
    pub fn mode(&self, mode: impl Into<String>) -> ModeScope {
        ModeScope {
            mode: mode.into(),
            sink: self.sink.clone(),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.sink.lock().map_err(|_| Error::SinkPoisoned)?.flush()
    }
}

pub struct ModeScope {
    mode: String,
    sink: SharedSink,
}

impl ModeScope {
    pub fn name(&self) -> &str {
        &self.mode
    }

    pub fn scalar(&self, tag: impl Into<String>) -> ScalarWriter {
        ScalarWriter {
            mode: self.mode.clone(),
            tag: tag.into(),
            sink: self.sink.clone(),
        }
    }

    /// Image handle keeping at most `num_samples` samples per step.
    pub fn image(&self, tag: impl Into<String>, num_samples: usize) -> ImageWriter {
        ImageWriter {
            mode: self.mode.clone(),
            tag: tag.into(),
            sink: self.sink.clone(),
            num_samples,
            step: 0,
            sampling: None,
        }
    }

    pub fn histogram(&self, tag: impl Into<String>, num_buckets: usize) -> HistogramWriter {
        HistogramWriter {
            mode: self.mode.clone(),
            tag: tag.into(),
            sink: self.sink.clone(),
            num_buckets,
        }
    }
}

pub struct ScalarWriter {
    mode: String,
    tag: String,
    sink: SharedSink,
}

impl ScalarWriter {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn add_record(&self, step: u64, value: f64) -> Result<()> {
        emit(&self.sink, Entry::new(&self.mode, &self.tag, Record::Scalar { step, value }))
    }
}

/// Collects image samples between `start_sampling` and `finish_sampling`;
/// each finished round becomes one record and advances the image step.
pub struct ImageWriter {
    mode: String,
    tag: String,
    sink: SharedSink,
    num_samples: usize,
    step: u64,
    sampling: Option<Vec<ImageSample>>,
}

impl ImageWriter {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Step the next finished round will be recorded at.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.is_some()
    }

    pub fn start_sampling(&mut self) -> Result<()> {
        if self.sampling.is_some() {
            return Err(Error::Sampling(format!(
                "'{}': start_sampling called twice without finish_sampling",
                self.tag
            )));
        }
        self.sampling = Some(Vec::with_capacity(self.num_samples));
        Ok(())
    }

    /// Adds one sample to the current round. Returns `false` when the round
    /// already holds `num_samples` samples and this one was dropped.
    pub fn add_sample(&mut self, shape: &[usize], data: &[f32]) -> Result<bool> {
        if !png::is_image_shape(shape) {
            return Err(Error::Sampling(format!(
                "'{}': image samples must be [rows, cols] or [rows, cols, 1], got {:?}",
                self.tag, shape
            )));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::Sampling(format!(
                "'{}': shape {:?} needs {} values, got {}",
                self.tag,
                shape,
                expected,
                data.len()
            )));
        }
        let samples = self.sampling.as_mut().ok_or_else(|| {
            Error::Sampling(format!("'{}': add_sample called before start_sampling", self.tag))
        })?;
        if samples.len() >= self.num_samples {
            log::warn!(
                "'{}': dropping image sample beyond {} per step",
                self.tag,
                self.num_samples
            );
            return Ok(false);
        }
        samples.push(ImageSample {
            shape: shape.to_vec(),
            data: data.to_vec(),
        });
        Ok(true)
    }

    pub fn finish_sampling(&mut self) -> Result<()> {
        let samples = self.sampling.take().ok_or_else(|| {
            Error::Sampling(format!("'{}': finish_sampling called before start_sampling", self.tag))
        })?;
        let step = self.step;
        self.step += 1;
        emit(&self.sink, Entry::new(&self.mode, &self.tag, Record::Image { step, samples }))
    }
}

pub struct HistogramWriter {
    mode: String,
    tag: String,
    sink: SharedSink,
    num_buckets: usize,
}

impl HistogramWriter {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn add_record(&self, step: u64, values: &[f32]) -> Result<()> {
        let histogram = Histogram::from_values(values, self.num_buckets);
        emit(&self.sink, Entry::new(&self.mode, &self.tag, Record::Histogram { step, histogram }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::sink::MemorySink;

    fn memory_writer() -> (Arc<Mutex<MemorySink>>, LogWriter) {
        let memory = Arc::new(Mutex::new(MemorySink::new()));
        let sink: SharedSink = memory.clone();
        (memory, LogWriter::with_sink(sink))
    }

    #[test]
    fn handles_share_mode_and_sink() {
        let (memory, writer) = memory_writer();
        let train = writer.mode("train");
        train.scalar("scalars/scalar0").add_record(4, 0.75).unwrap();
        train.histogram("histogram/histogram0", 10).add_record(1, &[0.0, 1.0]).unwrap();
        writer.flush().unwrap();

        let memory = memory.lock().unwrap();
        assert_eq!(memory.entries().len(), 2);
        assert!(memory.entries().iter().all(|e| e.mode == "train"));
        assert_eq!(memory.entries()[0].record, Record::Scalar { step: 4, value: 0.75 });
        assert_eq!(memory.flush_count(), 1);
    }

    #[test]
    fn image_round_keeps_num_samples() {
        let (memory, writer) = memory_writer();
        let mut image = writer.mode("train").image("images/image0", 1);
        image.start_sampling().unwrap();
        assert!(image.add_sample(&[1, 2], &[0.0, 1.0]).unwrap());
        assert!(!image.add_sample(&[1, 2], &[2.0, 3.0]).unwrap());
        image.finish_sampling().unwrap();
        assert_eq!(image.step(), 1);

        let memory = memory.lock().unwrap();
        match &memory.entries()[0].record {
            Record::Image { step, samples } => {
                assert_eq!(*step, 0);
                assert_eq!(samples.len(), 1);
                assert_eq!(samples[0].data, vec![0.0, 1.0]);
            }
            other => panic!("expected image record, got {other:?}"),
        }
    }

    #[test]
    fn image_protocol_violations() {
        let (_memory, writer) = memory_writer();
        let mut image = writer.mode("train").image("img", 1);
        assert!(matches!(image.add_sample(&[1], &[0.0]), Err(Error::Sampling(_))));
        assert!(matches!(image.finish_sampling(), Err(Error::Sampling(_))));
        image.start_sampling().unwrap();
        assert!(matches!(image.start_sampling(), Err(Error::Sampling(_))));
        assert!(matches!(image.add_sample(&[2, 2], &[0.0]), Err(Error::Sampling(_))));
    }

    #[test]
    fn flat_sample_rejected_before_reaching_sink() {
        let (memory, writer) = memory_writer();
        let mut image = writer.mode("train").image("img", 2);
        image.start_sampling().unwrap();
        assert!(matches!(image.add_sample(&[4], &[0.0; 4]), Err(Error::Sampling(_))));
        assert!(image.add_sample(&[2, 2, 1], &[0.0; 4]).unwrap());
        image.finish_sampling().unwrap();

        let memory = memory.lock().unwrap();
        match &memory.entries()[0].record {
            Record::Image { samples, .. } => assert_eq!(samples.len(), 1),
            other => panic!("expected image record, got {other:?}"),
        }
    }
}
