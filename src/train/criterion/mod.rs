//! Loss criteria and the two-stage criterion schedule
//!
//! - [`CrossEntropy`] - softmax cross-entropy with optional label smoothing
//! - [`FocalLoss`] - down-weights well-classified examples by `(1 - p_t)^gamma`
//! - [`ClassBalancedLoss`] - focal loss weighted by the effective number of samples per class
//! - [`CriterionSchedule`] - switches from criterion A to criterion B at a fixed epoch

mod cross_entropy;
mod focal;
mod schedule;


pub use cross_entropy::CrossEntropy;
pub use focal::{ClassBalancedLoss, FocalLoss};
pub use schedule::{CriterionSchedule, Stage};

use crate::config::CriterionParams;
use crate::error::ConfigError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Accepted criterion identifiers.
pub const CRITERION_TYPES: &[&str] = &["cross_entropy", "focal", "class_balanced"];

/// Mean loss over a batch together with `d loss / d logits`.
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub value: f32,
    pub grad: Array2<f32>,
}

/// A classification loss over raw logits.
pub trait Criterion: Send {
    /// Loss for `logits` `[batch, classes]` against integer `targets`.
    fn compute(&self, logits: ArrayView2<'_, f32>, targets: &[usize]) -> LossOutput;

    fn name(&self) -> &'static str;
}

/// Numerically stable softmax of one row.
pub(crate) fn softmax(row: ArrayView1<'_, f32>) -> Array1<f32> {
    let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp = row.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// `ln p` floored at the smallest normal float. NaN stays NaN so that
/// non-finite logits surface as a non-finite loss.
pub(crate) fn floored_ln(p: f32) -> f32 {
    if p.is_nan() {
        return f32::NAN;
    }
    p.max(f32::MIN_POSITIVE).ln()
}

/// Build a criterion by identifier.
///
/// `class_counts` is the remapped training distribution; only
/// `class_balanced` reads it.
pub fn build_criterion(
    field: &str,
    kind: &str,
    params: &CriterionParams,
    class_counts: &[usize],
) -> Result<Box<dyn Criterion>, ConfigError> {
    let criterion: Box<dyn Criterion> = match kind {
        "cross_entropy" => Box::new(CrossEntropy::new(params.label_smoothing)),
        "focal" => Box::new(FocalLoss::new(params.gamma.unwrap_or(2.0))),
        "class_balanced" => Box::new(ClassBalancedLoss::new(
            class_counts,
            params.beta,
            params.gamma.unwrap_or(0.0),
        )),
        other => return Err(ConfigError::unknown(field, other, CRITERION_TYPES)),
    };
    Ok(criterion)
}
