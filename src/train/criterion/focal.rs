//! Focal and class-balanced losses

use super::{floored_ln, softmax, Criterion, LossOutput};
use ndarray::{Array2, ArrayView2};

/// Focal loss: `-(1 - p_t)^γ · ln p_t`
///
/// γ = 0 is plain cross-entropy.
#[derive(Debug, Clone, Copy)]
pub struct FocalLoss {
    gamma: f32,
}

impl FocalLoss {
    pub fn new(gamma: f32) -> Self {
        Self { gamma }
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }
}

impl Default for FocalLoss {
    fn default() -> Self {
        Self::new(2.0)
    }
}

/// Weighted focal loss over a batch.
///
/// For one example with target probability `p_t`, the gradient with respect
/// to logit `j` is `F · (δ_jt - p_j)` where
/// `F = γ(1-p_t)^(γ-1) p_t ln p_t - (1-p_t)^γ`.
fn focal_batch(logits: ArrayView2<'_, f32>, targets: &[usize], gamma: f32, weights: Option<&[f32]>) -> LossOutput {
    let (n, k) = logits.dim();
    let mut grad = Array2::zeros((n, k));
    if n == 0 {
        return LossOutput { value: 0.0, grad };
    }
    let scale = 1.0 / n as f32;

    let mut total = 0.0;
    for (i, (row, &target)) in logits.rows().into_iter().zip(targets).enumerate() {
        let probs = softmax(row);
        let weight = weights.map_or(1.0, |w| w[target]);
        let log_pt = floored_ln(probs[target]);
        let pt = probs[target].max(f32::MIN_POSITIVE);
        let rest = (1.0 - pt).max(0.0);

        let modulator = if gamma == 0.0 { 1.0 } else { rest.powf(gamma) };
        total -= weight * modulator * log_pt;

        let slope = if gamma == 0.0 {
            -1.0
        } else {
            // rest^(γ-1) diverges as p_t → 1 while p_t ln p_t → 0; their product vanishes
            let lead = if rest > 1e-12 { gamma * rest.powf(gamma - 1.0) * pt * log_pt } else { 0.0 };
            lead - modulator
        };
        for (j, &p) in probs.iter().enumerate() {
            let indicator = if j == target { 1.0 } else { 0.0 };
            grad[[i, j]] = weight * slope * (indicator - p) * scale;
        }
    }
    LossOutput { value: total * scale, grad }
}

impl Criterion for FocalLoss {
    fn compute(&self, logits: ArrayView2<'_, f32>, targets: &[usize]) -> LossOutput {
        focal_batch(logits, targets, self.gamma, None)
    }

    fn name(&self) -> &'static str {
        "focal"
    }
}

/// Class-balanced focal loss
///
/// Each class is weighted by the inverse of its effective number of samples
/// `(1 - β^n) / (1 - β)`, normalised so the weights sum to the class count.
/// With γ = 0 this is class-balanced cross-entropy.
#[derive(Debug, Clone)]
pub struct ClassBalancedLoss {
    weights: Vec<f32>,
    gamma: f32,
}

impl ClassBalancedLoss {
    pub fn new(class_counts: &[usize], beta: f32, gamma: f32) -> Self {
        let beta = f64::from(beta);
        let raw: Vec<f64> = class_counts
            .iter()
            .map(|&count| {
                let effective = (1.0 - beta.powf(count.max(1) as f64)) / (1.0 - beta);
                1.0 / effective
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        let k = raw.len() as f64;
        let weights = raw.iter().map(|w| (w * k / sum) as f32).collect();
        Self { weights, gamma }
    }

    /// Per-class weights, summing to the number of classes.
    pub fn class_weights(&self) -> &[f32] {
        &self.weights
    }
}

impl Criterion for ClassBalancedLoss {
    fn compute(&self, logits: ArrayView2<'_, f32>, targets: &[usize]) -> LossOutput {
        focal_batch(logits, targets, self.gamma, Some(&self.weights))
    }

    fn name(&self) -> &'static str {
        "class_balanced"
    }
}
