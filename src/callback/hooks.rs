use crate::callback::context::{BatchEndParam, CallbackContext, EpochEndParam};
use crate::error::{Error, Result};
use crate::summary::writer::{HistogramWriter, ImageWriter, ScalarWriter};

/// Called by the trainer after every training batch.
pub trait BatchEndCallback {
    fn on_batch_end(&mut self, ctx: &mut CallbackContext, param: &BatchEndParam<'_>) -> Result<()>;
}

/// Called by the trainer at the end of every epoch.
pub trait EpochEndCallback {
    fn on_epoch_end(&mut self, ctx: &mut CallbackContext, param: &EpochEndParam<'_>) -> Result<()>;
}

impl<F> BatchEndCallback for F
where
    F: FnMut(&mut CallbackContext, &BatchEndParam<'_>) -> Result<()>,
{
    fn on_batch_end(&mut self, ctx: &mut CallbackContext, param: &BatchEndParam<'_>) -> Result<()> {
        self(ctx, param)
    }
}

impl<F> EpochEndCallback for F
where
    F: FnMut(&mut CallbackContext, &EpochEndParam<'_>) -> Result<()>,
{
    fn on_epoch_end(&mut self, ctx: &mut CallbackContext, param: &EpochEndParam<'_>) -> Result<()> {
        self(ctx, param)
    }
}

/// The callbacks of one `fit` run together with their shared context.
///
/// Callbacks run in registration order; the first error aborts the run.
#[derive(Default)]
pub struct Callbacks {
    pub context: CallbackContext,
    batch_end: Vec<Box<dyn BatchEndCallback>>,
    epoch_end: Vec<Box<dyn EpochEndCallback>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Callbacks::default()
    }

    pub fn with_context(context: CallbackContext) -> Self {
        Callbacks {
            context,
            ..Callbacks::default()
        }
    }

    pub fn on_batch_end(mut self, callback: impl BatchEndCallback + 'static) -> Self {
        self.batch_end.push(Box::new(callback));
        self
    }

    pub fn on_epoch_end(mut self, callback: impl EpochEndCallback + 'static) -> Self {
        self.epoch_end.push(Box::new(callback));
        self
    }

    pub fn batch_end(&mut self, param: &BatchEndParam<'_>) -> Result<()> {
        for callback in &mut self.batch_end {
            callback.on_batch_end(&mut self.context, param)?;
        }
        Ok(())
    }

    pub fn epoch_end(&mut self, param: &EpochEndParam<'_>) -> Result<()> {
        for callback in &mut self.epoch_end {
            callback.on_epoch_end(&mut self.context, param)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Summary adapters
// ---------------------------------------------------------------------------

/// Records every eval-metric value of a batch as a scalar, one step per value.
pub struct ScalarCallback {
    scalar: ScalarWriter,
}

impl ScalarCallback {
    pub fn new(scalar: ScalarWriter) -> Self {
        ScalarCallback { scalar }
    }
}

impl BatchEndCallback for ScalarCallback {
    fn on_batch_end(&mut self, ctx: &mut CallbackContext, param: &BatchEndParam<'_>) -> Result<()> {
        for (_name, value) in param.eval_metric.name_value() {
            self.scalar.add_record(ctx.advance(), value)?;
        }
        Ok(())
    }
}

/// At epoch end, snapshots one named parameter as an image sample and as a
/// histogram recorded at the epoch number.
pub struct ImageHistogramCallback {
    image: ImageWriter,
    histogram: HistogramWriter,
    param: String,
    shape: Vec<usize>,
}

impl ImageHistogramCallback {
    /// `shape` is how the parameter's flat values are laid out in the image,
    /// e.g. `[100, 50]` for a 500×10 weight matrix.
    pub fn new(
        image: ImageWriter,
        histogram: HistogramWriter,
        param: impl Into<String>,
        shape: Vec<usize>,
    ) -> Self {
        ImageHistogramCallback {
            image,
            histogram,
            param: param.into(),
            shape,
        }
    }
}

impl EpochEndCallback for ImageHistogramCallback {
    fn on_epoch_end(
        &mut self,
        _ctx: &mut CallbackContext,
        param: &EpochEndParam<'_>,
    ) -> Result<()> {
        let tensor = param
            .params
            .get(&self.param)
            .ok_or_else(|| Error::MissingParam(self.param.clone()))?;

        let expected: usize = self.shape.iter().product();
        if tensor.data.len() != expected {
            return Err(Error::ShapeMismatch {
                name: self.param.clone(),
                shape: self.shape.clone(),
                expected,
                actual: tensor.data.len(),
            });
        }

        self.image.start_sampling()?;
        self.image.add_sample(&self.shape, &tensor.data)?;
        self.image.finish_sampling()?;
        self.histogram.add_record(param.epoch as u64, &tensor.data)
    }
}
