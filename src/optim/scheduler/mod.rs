//! Learning rate schedulers
//!
//! Epoch-wise learning rate schedules:
//! - `ConstantLR` - Fixed learning rate
//! - `StepDecayLR` - Step decay by factor every N epochs
//! - `CosineAnnealingLR` - Smooth cosine decay
//!
//! Plateau-driven reduction is owned by the training loop's plateau
//! controller, since it depends on validation metrics.

mod constant;
mod cosine_annealing;
mod step_decay;


pub use constant::ConstantLR;
pub use cosine_annealing::CosineAnnealingLR;
pub use step_decay::StepDecayLR;

/// Learning rate scheduler trait
pub trait LRScheduler: Send {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Step the scheduler (called after each epoch)
    fn step(&mut self);

    /// Apply the current learning rate to an optimizer
    fn apply(&self, optimizer: &mut dyn crate::optim::Optimizer) {
        optimizer.set_lr(self.get_lr());
    }
}
