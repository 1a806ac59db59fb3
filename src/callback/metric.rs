use crate::data::iter::Batch;
use crate::error::{Error, Result};

/// A running evaluation metric, updated once per batch.
pub trait EvalMetric {
    fn name(&self) -> &str;

    /// Folds one batch in. Padded examples at the end of the batch are ignored.
    fn update(&mut self, batch: &Batch, predictions: &[usize]);

    /// Current `(name, value)` pairs.
    fn name_value(&self) -> Vec<(String, f64)>;

    fn reset(&mut self);
}

/// Builds a metric from its config name. A comma-separated list such as
/// `"acc,mean_intensity"` builds a [`MetricSet`].
pub fn metric_from_name(name: &str) -> Result<Box<dyn EvalMetric>> {
    if name.contains(',') {
        let metrics = name
            .split(',')
            .map(|part| metric_from_name(part.trim()))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Box::new(MetricSet::new(metrics)));
    }
    match name {
        "acc" | "accuracy" => Ok(Box::new(Accuracy::default())),
        "mean_intensity" => Ok(Box::new(MeanIntensity::default())),
        other => Err(Error::Config(format!("unknown eval metric '{other}'"))),
    }
}

/// Formats metric values as `name=value` pairs for log lines.
pub fn format_name_value(values: &[(String, f64)]) -> String {
    values
        .iter()
        .map(|(name, value)| format!("{name}={value:.6}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fraction of predictions equal to the label.
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    correct: u64,
    total: u64,
}

impl EvalMetric for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    fn update(&mut self, batch: &Batch, predictions: &[usize]) {
        let real = batch.len() - batch.pad;
        for (&label, &predicted) in batch.labels[..real].iter().zip(predictions) {
            if label as usize == predicted {
                self.correct += 1;
            }
            self.total += 1;
        }
    }

    fn name_value(&self) -> Vec<(String, f64)> {
        let value = if self.total == 0 {
            f64::NAN
        } else {
            self.correct as f64 / self.total as f64
        };
        vec![(self.name().to_string(), value)]
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Mean normalized pixel value of the examples seen.
#[derive(Debug, Clone, Default)]
pub struct MeanIntensity {
    sum: f64,
    count: u64,
}

impl EvalMetric for MeanIntensity {
    fn name(&self) -> &str {
        "mean_intensity"
    }

    fn update(&mut self, batch: &Batch, _predictions: &[usize]) {
        for i in 0..batch.len() - batch.pad {
            if let Some(item) = batch.item(i) {
                self.sum += item.iter().map(|&v| v as f64).sum::<f64>();
                self.count += item.len() as u64;
            }
        }
    }

    fn name_value(&self) -> Vec<(String, f64)> {
        let value = if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        };
        vec![(self.name().to_string(), value)]
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

/// Several metrics updated together; `name_value` concatenates theirs in order.
pub struct MetricSet {
    metrics: Vec<Box<dyn EvalMetric>>,
}

impl MetricSet {
    pub fn new(metrics: Vec<Box<dyn EvalMetric>>) -> Self {
        MetricSet { metrics }
    }
}

impl EvalMetric for MetricSet {
    fn name(&self) -> &str {
        "composite"
    }

    fn update(&mut self, batch: &Batch, predictions: &[usize]) {
        for metric in &mut self.metrics {
            metric.update(batch, predictions);
        }
    }

    fn name_value(&self) -> Vec<(String, f64)> {
        self.metrics.iter().flat_map(|m| m.name_value()).collect()
    }

    fn reset(&mut self) {
        for metric in &mut self.metrics {
            metric.reset();
        }
    }
}
