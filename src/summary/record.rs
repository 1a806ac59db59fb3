use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::summary::histogram::Histogram;

/// A flat tensor captured for the image view, e.g. a weight matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// The payload of one summary line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Scalar { step: u64, value: f64 },
    Image { step: u64, samples: Vec<ImageSample> },
    Histogram { step: u64, histogram: Histogram },
}

impl Record {
    pub fn step(&self) -> u64 {
        match self {
            Record::Scalar { step, .. }
            | Record::Image { step, .. }
            | Record::Histogram { step, .. } => *step,
        }
    }
}

/// A record addressed to a mode and tag, stamped with wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub mode: String,
    pub tag: String,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub record: Record,
}

impl Entry {
    pub fn new(mode: impl Into<String>, tag: impl Into<String>, record: Record) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Entry {
            mode: mode.into(),
            tag: tag.into(),
            timestamp_ms,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_line_is_flat_and_tagged() {
        let entry = Entry::new("train", "scalars/scalar0", Record::Scalar { step: 3, value: 0.5 });
        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "scalar");
        assert_eq!(json["mode"], "train");
        assert_eq!(json["tag"], "scalars/scalar0");
        assert_eq!(json["step"], 3);
        assert_eq!(json["value"], 0.5);
    }

    #[test]
    fn histogram_entry_parses_back() {
        let histogram = Histogram::from_values(&[0.0, 1.0, 2.0], 2);
        let entry = Entry::new("train", "h", Record::Histogram { step: 1, histogram });
        let line = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.record.step(), 1);
    }
}
