//! Epoch-level training and evaluation passes

use super::{PhaseParts, PhaseRunner};
use crate::data::{BatchLoader, Sample, Split};
use crate::error::{Error, Result};
use crate::model::{ClassifierModel, ModelError};
use crate::optim::clip_grad_norm;
use crate::train::criterion::Criterion;
use crate::train::metrics::{EpochMetrics, MetricAccumulator};
use std::sync::Arc;

impl PhaseRunner<'_> {
    /// One pass over the epoch's draw.
    ///
    /// Each batch: forward, loss, backward, clip, optimizer step, then
    /// regularization. Batches with a non-finite loss or gradient norm are
    /// skipped without an update until `max_nonfinite_batches` is exceeded.
    ///
    /// # Returns
    ///
    /// Training metrics and the number of skipped non-finite batches
    pub(super) fn train_epoch(
        &self,
        model: &mut dyn ClassifierModel,
        parts: &mut PhaseParts,
        epoch: usize,
    ) -> Result<(EpochMetrics, usize)> {
        let training = &self.config.training;
        let grad_clip = training.grad_clip();
        let order = parts.sampler.epoch_order(epoch);
        let mut metrics = MetricAccumulator::new(self.data.num_classes);
        let mut nonfinite = 0;

        for (step, batch) in self.loader.epoch(Arc::clone(&self.data.train), order, Split::Train).enumerate() {
            model.zero_grad();
            let logits = model.forward(&batch, true).map_err(|e| self.model_error(e))?;
            let loss = parts.criterion.loss(logits.view(), &batch.targets);

            let mut finite = loss.value.is_finite();
            if finite {
                model.backward(&loss.grad).map_err(|e| self.model_error(e))?;
                if let Some(max_norm) = grad_clip {
                    finite = clip_grad_norm(model.parameters_mut(), max_norm).is_finite();
                }
            }
            if !finite {
                nonfinite += 1;
                if nonfinite > training.max_nonfinite_batches {
                    return Err(Error::TrainingDivergence { phase: self.index, epoch, batch: step, loss: loss.value });
                }
                tracing::warn!(phase = %self.config.name, epoch, batch = step, loss = loss.value, "skipping non-finite batch");
                model.zero_grad();
                continue;
            }

            parts.optimizer.step(model.parameters_mut());
            let touched = parts.regularization.apply(model.parameters_mut(), epoch);
            metrics.update(logits.view(), &batch.targets, loss.value);
            tracing::debug!(
                epoch,
                batch = step,
                size = batch.len(),
                loss = loss.value,
                projected = touched.projected_rows,
                normalized = touched.normalized_rows,
                "train step"
            );
        }
        Ok((metrics.finish(), nonfinite))
    }
}

/// Forward-only pass over `samples` in their stored order.
pub fn evaluate(
    model: &mut dyn ClassifierModel,
    loader: &BatchLoader,
    samples: Arc<[Sample]>,
    split: Split,
    criterion: &dyn Criterion,
    num_classes: usize,
) -> std::result::Result<EpochMetrics, ModelError> {
    let order: Vec<usize> = (0..samples.len()).collect();
    let mut metrics = MetricAccumulator::new(num_classes);
    for batch in loader.epoch(samples, order, split) {
        let logits = model.forward(&batch, false)?;
        let loss = criterion.compute(logits.view(), &batch.targets);
        metrics.update(logits.view(), &batch.targets, loss.value);
    }
    Ok(metrics.finish())
}
