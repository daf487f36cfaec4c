//! Adam optimizer

use super::optimizer::{is_trainable, Optimizer};
use crate::model::Parameter;
use ndarray::{ArrayD, Zip};

/// Per-parameter first and second moments.
#[derive(Debug, Clone, Default)]
pub(crate) struct Moments {
    pub m: Vec<Option<ArrayD<f32>>>,
    pub v: Vec<Option<ArrayD<f32>>>,
}

impl Moments {
    pub(crate) fn ensure(&mut self, len: usize) {
        if self.m.len() != len {
            self.m = vec![None; len];
            self.v = vec![None; len];
        }
    }

    /// Update moments for parameter `i` with gradient `grad` and apply
    /// `p -= lr_t * m / (sqrt(v) + eps_t)`.
    pub(crate) fn apply(
        &mut self,
        i: usize,
        value: &mut ArrayD<f32>,
        grad: &ArrayD<f32>,
        (beta1, beta2): (f32, f32),
        lr_t: f32,
        eps: f32,
    ) {
        let m = self.m[i].get_or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
        let v = self.v[i].get_or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
        Zip::from(value).and(grad).and(m).and(v).for_each(|p, &g, m, v| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + eps);
        });
    }
}

/// Bias-corrected step size for step `t` (1-based).
pub(crate) fn corrected_lr(lr: f32, (beta1, beta2): (f32, f32), t: u64) -> f32 {
    let t = t.min(i32::MAX as u64) as i32;
    lr * (1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t))
}

/// Adam with L2 weight decay folded into the gradient
pub struct Adam {
    lr: f32,
    betas: (f32, f32),
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    moments: Moments,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { lr, betas: (beta1, beta2), epsilon, weight_decay: 0.0, t: 0, moments: Moments::default() }
    }

    /// Create Adam with default parameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Steps taken so far.
    pub fn step_count(&self) -> u64 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Parameter]) {
        self.moments.ensure(params.len());
        self.t += 1;
        let lr_t = corrected_lr(self.lr, self.betas, self.t);

        for (i, param) in params.iter_mut().enumerate() {
            if !is_trainable(param) {
                continue;
            }
            let Some(grad) = param.grad.as_ref() else { continue };
            let mut grad = grad.clone();
            if self.weight_decay != 0.0 {
                grad.scaled_add(self.weight_decay, &param.value);
            }
            self.moments.apply(i, &mut param.value, &grad, self.betas, lr_t, self.epsilon);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}
