//! AdamW optimizer (Adam with decoupled Weight decay)

use super::adam::{corrected_lr, Moments};
use super::optimizer::{is_trainable, Optimizer};
use crate::model::Parameter;

/// AdamW optimizer
///
/// Standard Adam with L2: θ_t = θ_{t-1} - lr * (m_t / (√v_t + ε) + λ * θ_{t-1})
/// AdamW: θ_t = (1 - lr * λ) * θ_{t-1} - lr * m_t / (√v_t + ε)
pub struct AdamW {
    lr: f32,
    betas: (f32, f32),
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    moments: Moments,
}

impl AdamW {
    /// Create a new AdamW optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self { lr, betas: (beta1, beta2), epsilon, weight_decay, t: 0, moments: Moments::default() }
    }

    /// Create AdamW with default parameters (weight_decay = 0.01)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.01)
    }

    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, params: &mut [Parameter]) {
        self.moments.ensure(params.len());
        self.t += 1;
        let lr_t = corrected_lr(self.lr, self.betas, self.t);
        let decay = 1.0 - self.lr * self.weight_decay;

        for (i, param) in params.iter_mut().enumerate() {
            if !is_trainable(param) {
                continue;
            }
            let Some(grad) = param.grad.take() else { continue };
            if self.weight_decay != 0.0 {
                param.value.mapv_inplace(|p| p * decay);
            }
            self.moments.apply(i, &mut param.value, &grad, self.betas, lr_t, self.epsilon);
            param.grad = Some(grad);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        "adamw"
    }
}
