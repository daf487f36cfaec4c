//! Stochastic Gradient Descent optimizer

use super::optimizer::{is_trainable, Optimizer};
use crate::model::Parameter;
use ndarray::{ArrayD, Zip};

/// SGD optimizer with optional (Nesterov) momentum and L2 weight decay
pub struct SGD {
    lr: f32,
    momentum: f32,
    nesterov: bool,
    weight_decay: f32,
    velocities: Vec<Option<ArrayD<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self { lr, momentum, nesterov: false, weight_decay: 0.0, velocities: Vec::new() }
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Initialize velocities if needed
    fn ensure_velocities(&mut self, params: &[Parameter]) {
        if self.velocities.len() != params.len() {
            self.velocities = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Parameter]) {
        self.ensure_velocities(params);

        for (i, param) in params.iter_mut().enumerate() {
            if !is_trainable(param) {
                continue;
            }
            let Some(grad) = param.grad.as_ref() else { continue };

            // d = grad + wd * p
            let mut d = grad.clone();
            if self.weight_decay != 0.0 {
                d.scaled_add(self.weight_decay, &param.value);
            }

            if self.momentum > 0.0 {
                let velocity = match self.velocities[i].take() {
                    Some(mut v) => {
                        Zip::from(&mut v).and(&d).for_each(|v, &g| *v = self.momentum * *v + g);
                        v
                    }
                    None => d.clone(),
                };
                if self.nesterov {
                    d.scaled_add(self.momentum, &velocity);
                } else {
                    d.assign(&velocity);
                }
                self.velocities[i] = Some(velocity);
            }

            param.value.scaled_add(-self.lr, &d);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}
