//! Cosine annealing over a fixed number of epochs

use super::LRScheduler;
use std::f32::consts::PI;

/// `lr(e) = eta_min + (base - eta_min) * (1 + cos(pi * e / t_max)) / 2`,
/// held at `eta_min` once `e >= t_max`.
pub struct CosineAnnealingLR {
    base_lr: f32,
    eta_min: f32,
    t_max: usize,
    epoch: usize,
}

impl CosineAnnealingLR {
    pub fn new(base_lr: f32, t_max: usize, eta_min: f32) -> Self {
        Self { base_lr, eta_min, t_max, epoch: 0 }
    }

    /// Anneal down to zero.
    pub fn default_min(base_lr: f32, t_max: usize) -> Self {
        Self::new(base_lr, t_max, 0.0)
    }
}

impl LRScheduler for CosineAnnealingLR {
    fn get_lr(&self) -> f32 {
        if self.t_max == 0 || self.epoch >= self.t_max {
            return self.eta_min;
        }
        let progress = self.epoch as f32 / self.t_max as f32;
        self.eta_min + (self.base_lr - self.eta_min) * 0.5 * (1.0 + (PI * progress).cos())
    }

    fn step(&mut self) {
        self.epoch += 1;
    }
}
