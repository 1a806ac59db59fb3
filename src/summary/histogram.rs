use serde::{Deserialize, Serialize};

/// One equal-width bin `[left, right)`; the last bin is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub left: f64,
    pub right: f64,
    pub count: u64,
}

/// Distribution of a set of values over equal-width buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub buckets: Vec<Bucket>,
}

impl Histogram {
    /// Buckets `values` into `num_buckets` bins spanning `[min, max]`.
    ///
    /// NaN and infinite values are skipped. When every finite value is equal
    /// a single bucket holds them all; with no finite values the histogram is
    /// empty.
    pub fn from_values(values: &[f32], num_buckets: usize) -> Histogram {
        let finite: Vec<f64> = values
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| v as f64)
            .collect();

        if finite.is_empty() {
            return Histogram { min: 0.0, max: 0.0, buckets: Vec::new() };
        }

        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if min == max {
            return Histogram {
                min,
                max,
                buckets: vec![Bucket { left: min, right: max, count: finite.len() as u64 }],
            };
        }

        let num_buckets = num_buckets.max(1);
        let width = (max - min) / num_buckets as f64;
        let mut buckets: Vec<Bucket> = (0..num_buckets)
            .map(|i| Bucket {
                left: min + width * i as f64,
                right: if i + 1 == num_buckets { max } else { min + width * (i + 1) as f64 },
                count: 0,
            })
            .collect();

        for v in finite {
            let idx = (((v - min) / width) as usize).min(num_buckets - 1);
            buckets[idx].count += 1;
        }

        Histogram { min, max, buckets }
    }

    /// Sum of all bucket counts.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sum_to_finite_values() {
        let values = [0.0, 0.1, 0.5, 0.9, 1.0, f32::NAN, f32::INFINITY];
        let h = Histogram::from_values(&values, 4);
        assert_eq!(h.buckets.len(), 4);
        assert_eq!(h.total(), 5);
        assert_eq!(h.min, 0.0);
        assert_eq!(h.max, 1.0);
        // max lands in the closed last bucket
        assert_eq!(h.buckets[3].count, 2);
        assert_eq!(h.buckets[0].count, 2);
    }

    #[test]
    fn constant_values_single_bucket() {
        let h = Histogram::from_values(&[2.5; 6], 10);
        assert_eq!(h.buckets.len(), 1);
        assert_eq!(h.buckets[0].count, 6);
    }

    #[test]
    fn no_finite_values_is_empty() {
        let h = Histogram::from_values(&[f32::NAN], 10);
        assert!(h.buckets.is_empty());
        assert_eq!(h.total(), 0);
    }
}
