//! Gradient clipping utilities

use crate::model::Parameter;

/// Clip gradients by global norm
///
/// Computes the global norm of all trainable gradients and scales them down if
/// the norm exceeds max_norm. This prevents exploding gradients while
/// preserving the relative magnitudes of gradients across parameters.
///
/// Algorithm:
/// 1. global_norm = sqrt(sum of all gradient squared norms)
/// 2. If global_norm > max_norm:
///    - clip_coef = max_norm / global_norm
///    - For each gradient: grad *= clip_coef
///
/// # Returns
/// The actual global norm before clipping
pub fn clip_grad_norm(params: &mut [Parameter], max_norm: f32) -> f32 {
    let total_norm_sq: f32 = params
        .iter()
        .filter(|p| p.requires_grad)
        .filter_map(|p| p.grad.as_ref())
        .map(|grad| grad.iter().map(|&g| g * g).sum::<f32>())
        .sum();

    let global_norm = total_norm_sq.sqrt();

    // Only clip if global norm exceeds max_norm
    if global_norm.is_finite() && global_norm > max_norm {
        let clip_coef = max_norm / global_norm;
        for param in params.iter_mut().filter(|p| p.requires_grad) {
            if let Some(grad) = param.grad.as_mut() {
                grad.mapv_inplace(|g| g * clip_coef);
            }
        }
    }

    global_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamRole;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn with_grad(values: &[f32]) -> Parameter {
        let mut p = Parameter::new("p", ParamRole::Weight, arr1(&vec![0.0; values.len()]).into_dyn());
        p.grad = Some(arr1(values).into_dyn());
        p
    }

    #[test]
    fn test_clip_grad_norm_no_clipping() {
        let mut params = vec![with_grad(&[0.1, 0.2]), with_grad(&[0.1])];

        // Global norm = sqrt(0.1^2 + 0.2^2 + 0.1^2) = sqrt(0.06) ≈ 0.245
        let global_norm = clip_grad_norm(&mut params, 1.0);

        assert_abs_diff_eq!(global_norm, 0.245, epsilon = 1e-3);
        assert_abs_diff_eq!(params[0].grad.as_ref().unwrap()[[1]], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_clip_grad_norm_with_clipping() {
        let mut params = vec![with_grad(&[3.0]), with_grad(&[4.0])];

        let global_norm = clip_grad_norm(&mut params, 1.0);

        assert_abs_diff_eq!(global_norm, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(params[0].grad.as_ref().unwrap()[[0]], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(params[1].grad.as_ref().unwrap()[[0]], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_frozen_gradients_ignored() {
        let mut params = vec![with_grad(&[3.0]), with_grad(&[4.0])];
        params[1].requires_grad = false;
        let global_norm = clip_grad_norm(&mut params, 10.0);
        assert_abs_diff_eq!(global_norm, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_norm_left_for_caller() {
        let mut params = vec![with_grad(&[f32::NAN])];
        assert!(clip_grad_norm(&mut params, 1.0).is_nan());
    }
}
