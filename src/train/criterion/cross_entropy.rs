//! Softmax cross-entropy

use super::{floored_ln, softmax, Criterion, LossOutput};
use ndarray::{Array2, ArrayView2};

/// Cross-entropy over logits
///
/// With smoothing ε the target distribution is `(1 - ε) * onehot + ε / K`,
/// so the gradient is `(softmax(z) - q) / N`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropy {
    label_smoothing: f32,
}

impl CrossEntropy {
    pub fn new(label_smoothing: f32) -> Self {
        Self { label_smoothing }
    }

    pub fn label_smoothing(&self) -> f32 {
        self.label_smoothing
    }
}

impl Criterion for CrossEntropy {
    fn compute(&self, logits: ArrayView2<'_, f32>, targets: &[usize]) -> LossOutput {
        let (n, k) = logits.dim();
        let mut grad = Array2::zeros((n, k));
        if n == 0 {
            return LossOutput { value: 0.0, grad };
        }
        let off = self.label_smoothing / k as f32;
        let on = 1.0 - self.label_smoothing + off;
        let scale = 1.0 / n as f32;

        let mut total = 0.0;
        for (i, (row, &target)) in logits.rows().into_iter().zip(targets).enumerate() {
            let probs = softmax(row);
            for (j, &p) in probs.iter().enumerate() {
                let q = if j == target { on } else { off };
                if q > 0.0 {
                    total -= q * floored_ln(p);
                }
                grad[[i, j]] = (p - q) * scale;
            }
        }
        LossOutput { value: total * scale, grad }
    }

    fn name(&self) -> &'static str {
        "cross_entropy"
    }
}
