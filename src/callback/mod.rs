pub mod context;
pub mod fit;
pub mod hooks;
pub mod metric;
pub mod pass;

pub use context::{BatchEndParam, CallbackContext, EpochEndParam, ParamStore, ParamTensor};
pub use fit::{EpochReport, FitConfig, FitReport, Trainer};
pub use hooks::{
    BatchEndCallback, Callbacks, EpochEndCallback, ImageHistogramCallback, ScalarCallback,
};
pub use metric::{
    format_name_value, metric_from_name, Accuracy, EvalMetric, MeanIntensity, MetricSet,
};
pub use pass::DatasetPass;
