use std::time::Instant;

use crate::callback::context::{BatchEndParam, EpochEndParam, ParamStore, ParamTensor};
use crate::callback::fit::{EpochReport, FitConfig, FitReport, Trainer};
use crate::callback::hooks::Callbacks;
use crate::callback::metric::{format_name_value, metric_from_name, EvalMetric};
use crate::data::iter::{Batch, BatchIter};
use crate::error::Result;

/// A [`Trainer`] that learns nothing: it walks the data exactly like a real
/// training run so the decode → batch → callback → summary path can run end
/// to end.
///
/// Its "prediction" is the most frequent label seen so far (a majority-class
/// baseline), and at each epoch end it exposes the mean image of the epoch as
/// the [`DatasetPass::PIXEL_MEAN`] parameter.
pub struct DatasetPass {
    class_counts: Vec<u64>,
    pixel_sum: Vec<f64>,
    pixel_count: u64,
    image_shape: Vec<usize>,
    log_every: usize,
}

impl DatasetPass {
    pub const PIXEL_MEAN: &'static str = "pixel_mean";

    /// Logs training progress every `log_every` batches; `0` disables it.
    pub fn new(log_every: usize) -> Self {
        DatasetPass {
            class_counts: Vec::new(),
            pixel_sum: Vec::new(),
            pixel_count: 0,
            image_shape: Vec::new(),
            log_every,
        }
    }

    /// Most frequent label observed so far; ties go to the smaller label.
    pub fn majority_class(&self) -> usize {
        self.class_counts
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn predict(&self, batch: &Batch) -> Vec<usize> {
        vec![self.majority_class(); batch.len()]
    }

    fn observe(&mut self, batch: &Batch) {
        let real = batch.len() - batch.pad;
        for &label in &batch.labels[..real] {
            let label = label as usize;
            if label >= self.class_counts.len() {
                self.class_counts.resize(label + 1, 0);
            }
            self.class_counts[label] += 1;
        }

        for i in 0..real {
            if let Some(item) = batch.item(i) {
                for (acc, &px) in self.pixel_sum.iter_mut().zip(item) {
                    *acc += px as f64;
                }
                self.pixel_count += 1;
            }
        }
    }

    /// Mean of the images observed this epoch; all zeros when none were.
    fn mean_image(&self) -> ParamTensor {
        let n = self.pixel_count.max(1) as f64;
        ParamTensor {
            shape: self.image_shape.clone(),
            data: self.pixel_sum.iter().map(|&s| (s / n) as f32).collect(),
        }
    }
}

impl Trainer for DatasetPass {
    fn fit(
        &mut self,
        train: &mut BatchIter<'_>,
        mut eval: Option<&mut BatchIter<'_>>,
        config: &FitConfig,
        callbacks: &mut Callbacks,
    ) -> Result<FitReport> {
        let mut metric = metric_from_name(&config.eval_metric)?;
        let mut report = FitReport::default();

        let dims = train.dataset().images().dims();
        self.image_shape = vec![dims.rows, dims.cols];
        self.pixel_sum = vec![0.0; dims.pixels()];

        log::info!(
            "fitting {} epochs of {} batches (optimizer={}, learning_rate={})",
            config.num_epoch,
            train.num_batches(),
            config.optimizer,
            config.learning_rate
        );

        for epoch in 0..config.num_epoch {
            let t_start = Instant::now();
            train.reset();
            metric.reset();
            self.pixel_sum.iter_mut().for_each(|s| *s = 0.0);
            self.pixel_count = 0;

            // ── Training batches ───────────────────────────────────────────
            let mut batches = 0;
            for (nbatch, batch) in train.by_ref().enumerate() {
                let predictions = self.predict(&batch);
                metric.update(&batch, &predictions);
                self.observe(&batch);

                callbacks.batch_end(&BatchEndParam {
                    epoch,
                    nbatch,
                    eval_metric: &*metric,
                })?;

                batches = nbatch + 1;
                if self.log_every > 0 && batches % self.log_every == 0 {
                    log::info!(
                        "Epoch[{epoch}] Batch [{batches}] {}",
                        format_name_value(&metric.name_value())
                    );
                }
            }

            let train_metrics = metric.name_value();
            let elapsed_ms = t_start.elapsed().as_millis() as u64;
            log::info!("Epoch[{epoch}] Train-{}", format_name_value(&train_metrics));
            log::info!("Epoch[{epoch}] Time cost={:.3}", elapsed_ms as f64 / 1000.0);

            // ── Epoch end ──────────────────────────────────────────────────
            let mut params = ParamStore::new();
            params.insert(Self::PIXEL_MEAN, self.mean_image());
            callbacks.epoch_end(&EpochEndParam { epoch, params: &params })?;

            // ── Validation ─────────────────────────────────────────────────
            let eval_metrics = match eval.as_deref_mut() {
                Some(iter) => {
                    let mut eval_metric = metric_from_name(&config.eval_metric)?;
                    self.score(iter, &mut *eval_metric)?;
                    let values = eval_metric.name_value();
                    log::info!("Epoch[{epoch}] Validation-{}", format_name_value(&values));
                    Some(values)
                }
                None => None,
            };

            report.epochs.push(EpochReport {
                epoch,
                total_epochs: config.num_epoch,
                batches,
                train_metrics,
                eval_metrics,
                elapsed_ms,
            });
        }

        Ok(report)
    }

    fn score(&mut self, iter: &mut BatchIter<'_>, metric: &mut dyn EvalMetric) -> Result<()> {
        iter.reset();
        for batch in iter.by_ref() {
            let predictions = self.predict(&batch);
            metric.update(&batch, &predictions);
        }
        Ok(())
    }
}
