use std::collections::BTreeMap;

use crate::callback::metric::EvalMetric;

/// State threaded through every callback invocation of one `fit` run.
///
/// The caller owns it and the trainer hands it to each callback by `&mut`,
/// so step numbering never lives in process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackContext {
    step: u64,
}

impl CallbackContext {
    pub fn new() -> Self {
        CallbackContext::default()
    }

    /// Resumes numbering from `step`, e.g. after an earlier run.
    pub fn starting_at(step: u64) -> Self {
        CallbackContext { step }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Returns the current step and moves to the next one.
    pub fn advance(&mut self) -> u64 {
        let step = self.step;
        self.step += 1;
        step
    }
}

/// Passed to batch-end callbacks after each training batch.
pub struct BatchEndParam<'a> {
    /// 0-based epoch.
    pub epoch: usize,
    /// 0-based batch index within the epoch.
    pub nbatch: usize,
    pub eval_metric: &'a dyn EvalMetric,
}

/// Passed to epoch-end callbacks once the epoch's batches are done.
pub struct EpochEndParam<'a> {
    pub epoch: usize,
    pub params: &'a ParamStore,
}

/// A named parameter snapshot, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Parameters exposed by the trainer at epoch end, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: BTreeMap<String, ParamTensor>,
}

impl ParamStore {
    pub fn new() -> Self {
        ParamStore::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ParamTensor) {
        self.params.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&ParamTensor> {
        self.params.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }
}
