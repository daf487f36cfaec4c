//! Optimizers, gradient clipping and learning-rate schedules

mod adam;
mod adamw;
mod clip;
mod factory;
mod optimizer;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use adamw::AdamW;
pub use clip::clip_grad_norm;
pub use factory::{build_lr_policy, build_optimizer, LrPolicy, OPTIMIZER_TYPES, SCHEDULER_TYPES};
pub use optimizer::Optimizer;
pub use scheduler::{ConstantLR, CosineAnnealingLR, LRScheduler, StepDecayLR};
pub use sgd::SGD;
