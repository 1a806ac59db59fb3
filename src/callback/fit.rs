use serde::{Deserialize, Serialize};

use crate::callback::hooks::Callbacks;
use crate::callback::metric::EvalMetric;
use crate::data::iter::BatchIter;
use crate::error::Result;

/// Hyperparameters handed to the trainer's `fit`.
///
/// `optimizer` and `learning_rate` are forwarded as-is; what they mean is up
/// to the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub num_epoch: usize,
    pub optimizer: String,
    pub learning_rate: f64,
    pub eval_metric: String,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            num_epoch: 2,
            optimizer: "sgd".into(),
            learning_rate: 0.1,
            eval_metric: "acc".into(),
        }
    }
}

/// Statistics of one completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochReport {
    /// 0-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    pub batches: usize,
    /// Training metric values at the end of the epoch.
    pub train_metrics: Vec<(String, f64)>,
    /// Validation metric values, when an eval iterator was supplied.
    pub eval_metrics: Option<Vec<(String, f64)>>,
    /// Wall-clock duration of the epoch's training batches.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
}

impl FitReport {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

/// The training framework as seen from this crate.
///
/// Implementations own the model and optimizer. They must call
/// `callbacks.batch_end` after every training batch and `callbacks.epoch_end`
/// after every epoch, always through the same `Callbacks` so the context
/// carries over.
pub trait Trainer {
    fn fit(
        &mut self,
        train: &mut BatchIter<'_>,
        eval: Option<&mut BatchIter<'_>>,
        config: &FitConfig,
        callbacks: &mut Callbacks,
    ) -> Result<FitReport>;

    /// Runs one pass over `iter` in inference mode, folding predictions into `metric`.
    fn score(&mut self, iter: &mut BatchIter<'_>, metric: &mut dyn EvalMetric) -> Result<()>;
}
