//! Optimizer and scheduler factories keyed by the configured `type`.

use super::scheduler::{ConstantLR, CosineAnnealingLR, LRScheduler, StepDecayLR};
use super::{Adam, AdamW, Optimizer, SGD};
use crate::config::{OptimizerSpec, SchedulerSpec};
use crate::error::ConfigError;

/// Accepted `optimizer.type` values.
pub const OPTIMIZER_TYPES: &[&str] = &["sgd", "adam", "adamw"];

/// Accepted `scheduler.type` values.
pub const SCHEDULER_TYPES: &[&str] = &["reduce_on_plateau", "step", "cosine", "constant"];

/// Build a fresh optimizer for one phase.
pub fn build_optimizer(spec: &OptimizerSpec) -> Result<Box<dyn Optimizer>, ConfigError> {
    let weight_decay = spec.effective_weight_decay();
    let optimizer: Box<dyn Optimizer> = match spec.kind.as_str() {
        "sgd" => Box::new(
            SGD::new(spec.lr, spec.momentum)
                .with_nesterov(spec.nesterov)
                .with_weight_decay(weight_decay),
        ),
        "adam" => Box::new(
            Adam::new(spec.lr, spec.betas.0, spec.betas.1, spec.eps).with_weight_decay(weight_decay),
        ),
        "adamw" => Box::new(AdamW::new(spec.lr, spec.betas.0, spec.betas.1, spec.eps, weight_decay)),
        other => return Err(ConfigError::unknown("optimizer.type", other, OPTIMIZER_TYPES)),
    };
    Ok(optimizer)
}

/// How the learning rate evolves across a phase.
pub enum LrPolicy {
    /// Reduced by the plateau controller from validation metrics
    ReduceOnPlateau,
    /// Advanced once per epoch regardless of metrics
    Epochwise(Box<dyn LRScheduler>),
}

impl LrPolicy {
    pub fn is_plateau(&self) -> bool {
        matches!(self, LrPolicy::ReduceOnPlateau)
    }
}

/// Build the learning-rate policy for one phase.
pub fn build_lr_policy(spec: &SchedulerSpec, base_lr: f32, num_epochs: usize) -> Result<LrPolicy, ConfigError> {
    let policy = match spec.kind.as_str() {
        "reduce_on_plateau" => LrPolicy::ReduceOnPlateau,
        "step" => LrPolicy::Epochwise(Box::new(StepDecayLR::new(base_lr, spec.step_size, spec.gamma))),
        "cosine" => LrPolicy::Epochwise(Box::new(CosineAnnealingLR::new(
            base_lr,
            spec.t_max.unwrap_or(num_epochs),
            spec.eta_min,
        ))),
        "constant" => LrPolicy::Epochwise(Box::new(ConstantLR::new(base_lr))),
        other => return Err(ConfigError::unknown("scheduler.type", other, SCHEDULER_TYPES)),
    };
    Ok(policy)
}
