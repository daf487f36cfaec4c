//! Step decay learning rate scheduler

use super::LRScheduler;

/// Multiplies the learning rate by `gamma` every `step_size` epochs:
/// `lr(e) = base * gamma^(e / step_size)`. A zero `step_size` never decays.
pub struct StepDecayLR {
    base_lr: f32,
    gamma: f32,
    step_size: usize,
    epoch: usize,
}

impl StepDecayLR {
    pub fn new(base_lr: f32, step_size: usize, gamma: f32) -> Self {
        Self { base_lr, gamma, step_size, epoch: 0 }
    }
}

impl LRScheduler for StepDecayLR {
    fn get_lr(&self) -> f32 {
        match self.step_size {
            0 => self.base_lr,
            size => self.base_lr * self.gamma.powi((self.epoch / size) as i32),
        }
    }

    fn step(&mut self) {
        self.epoch += 1;
    }
}
