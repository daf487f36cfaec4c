//! Optimizer trait

use crate::model::Parameter;

/// Trait for optimization algorithms
///
/// Implementations keep per-parameter state indexed by position, so the same
/// parameter slice must be passed on every step of a phase. Parameters without
/// a gradient or with `requires_grad == false` are left untouched.
pub trait Optimizer: Send {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Parameter]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Parameter]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Identifier used in configuration
    fn name(&self) -> &'static str;
}

/// Whether `param` takes part in an update.
pub(crate) fn is_trainable(param: &Parameter) -> bool {
    param.requires_grad && param.grad.is_some()
}
