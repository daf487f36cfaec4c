//! Sample Weight Policy: per-example sampling weights for imbalance correction.

use crate::config::{SamplerSpec, WeightCalculation};
use crate::error::ConfigError;

/// Per-class weights before they are spread over examples.
///
/// Classes absent from the training split count as one example so that their
/// weight stays finite.
pub fn class_weights(counts: &[usize], spec: &SamplerSpec) -> Result<Vec<f64>, ConfigError> {
    let num_classes = counts.len();
    let total: usize = counts.iter().sum();

    let raw: Vec<f64> = match spec.weight_calculation {
        WeightCalculation::Inverse => counts.iter().map(|&c| 1.0 / c.max(1) as f64).collect(),
        WeightCalculation::Balanced => counts
            .iter()
            .map(|&c| total as f64 / (num_classes as f64 * c.max(1) as f64))
            .collect(),
        WeightCalculation::Custom => {
            let table = spec.custom_weights.as_ref().ok_or_else(|| {
                ConfigError::invalid(
                    "weighted_random_sampler.custom_weights",
                    "weight_calculation 'custom' requires custom_weights",
                )
            })?;
            if table.len() != num_classes {
                return Err(ConfigError::invalid(
                    "weighted_random_sampler.custom_weights",
                    format!("{} weights given for {num_classes} classes", table.len()),
                ));
            }
            table.clone()
        }
    };

    let scaled: Vec<f64> = raw.into_iter().map(|w| if spec.apply_sqrt { w.sqrt() } else { w }).collect();
    if let Some(bound) = saturated_bound(&scaled, spec) {
        tracing::warn!(
            bound,
            calculation = ?spec.weight_calculation,
            "every class weight clamps to the same bound; sampling is effectively uniform"
        );
    }
    Ok(scaled.into_iter().map(|w| w.clamp(spec.min_weight, spec.max_weight)).collect())
}

/// The clamp bound every weight collapses onto, if they all do.
fn saturated_bound(weights: &[f64], spec: &SamplerSpec) -> Option<f64> {
    if weights.len() < 2 {
        return None;
    }
    if weights.iter().all(|&w| w <= spec.min_weight) {
        Some(spec.min_weight)
    } else if weights.iter().all(|&w| w >= spec.max_weight) {
        Some(spec.max_weight)
    } else {
        None
    }
}

/// One weight per training example, aligned 1:1 with `labels`.
pub fn sample_weights(labels: &[usize], num_classes: usize, spec: &SamplerSpec) -> Result<Vec<f64>, ConfigError> {
    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        counts[label] += 1;
    }
    let per_class = class_weights(&counts, spec)?;

    tracing::info!(
        counts = ?counts,
        weights = ?per_class,
        calculation = ?spec.weight_calculation,
        sqrt = spec.apply_sqrt,
        "computed class sampling weights"
    );
    Ok(labels.iter().map(|&label| per_class[label]).collect())
}
