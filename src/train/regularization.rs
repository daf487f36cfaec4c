//! Weight-norm regularization applied after each optimizer step
//!
//! Both operations act row-wise: a weight tensor of shape `[out, ...]` is
//! viewed as `out` vectors of length `prod(rest)`. Biases, normalization
//! parameters, 1-D tensors and frozen parameters are never touched.

use crate::config::{RegularizationScope, RegularizationSpec};
use crate::model::{ParamRole, Parameter};
use ndarray::ArrayView1;

/// Lp norm of one vector; `p = ∞` is the max-abs norm.
pub fn lp_norm(row: ArrayView1<'_, f32>, p: f32) -> f32 {
    if p.is_infinite() {
        row.iter().fold(0.0f32, |m, &x| m.max(x.abs()))
    } else if p == 1.0 {
        row.iter().map(|x| x.abs()).sum()
    } else if p == 2.0 {
        row.iter().map(|x| x * x).sum::<f32>().sqrt()
    } else {
        row.iter().map(|x| x.abs().powf(p)).sum::<f32>().powf(1.0 / p)
    }
}

/// Project every row of `param` onto the Lp ball of radius `bound`.
///
/// Rows already inside the ball are left bit-for-bit unchanged. Returns the
/// number of rows rescaled.
pub fn project_max_norm(param: &mut Parameter, bound: f32, p: f32) -> usize {
    let Some(mut rows) = param.rows_view_mut() else { return 0 };
    let mut rescaled = 0;
    for mut row in rows.rows_mut() {
        let norm = lp_norm(row.view(), p);
        if norm.is_finite() && norm > bound {
            let scale = bound / norm;
            row.mapv_inplace(|x| x * scale);
            rescaled += 1;
        }
    }
    rescaled
}

/// Rescale every non-zero row of `param` to Lp norm `tau`.
///
/// Returns the number of rows rescaled.
pub fn tau_normalize(param: &mut Parameter, tau: f32, p: f32) -> usize {
    let Some(mut rows) = param.rows_view_mut() else { return 0 };
    let mut normalized = 0;
    for mut row in rows.rows_mut() {
        let norm = lp_norm(row.view(), p);
        if norm.is_finite() && norm > 0.0 {
            let scale = tau / norm;
            row.mapv_inplace(|x| x * scale);
            normalized += 1;
        }
    }
    normalized
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MaxNorm {
    bound: f32,
    p: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TauNorm {
    tau: f32,
    p: f32,
    every: usize,
}

/// Rows touched by one [`RegularizationPolicy::apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegularizationReport {
    pub projected_rows: usize,
    pub normalized_rows: usize,
}

/// Per-phase max-norm projection and tau-normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularizationPolicy {
    max_norm: Option<MaxNorm>,
    tau_norm: Option<TauNorm>,
    scope: RegularizationScope,
}

impl RegularizationPolicy {
    pub fn from_spec(spec: &RegularizationSpec) -> Self {
        let max_norm = spec.max_norm.enabled.then(|| MaxNorm {
            bound: spec.max_norm.thresh * spec.max_norm.tau,
            p: spec.max_norm.lp_norm,
        });
        let tau_norm = spec.tau_normalization.enabled.then(|| TauNorm {
            tau: spec.tau_normalization.tau,
            p: spec.tau_normalization.lp_norm,
            every: spec.tau_normalization.apply_frequency.max(1),
        });
        Self { max_norm, tau_norm, scope: spec.scope }
    }

    /// No-op policy.
    pub fn disabled() -> Self {
        Self { max_norm: None, tau_norm: None, scope: RegularizationScope::All }
    }

    pub fn is_active(&self) -> bool {
        self.max_norm.is_some() || self.tau_norm.is_some()
    }

    /// Max-norm radius `thresh * tau`, when enabled.
    pub fn max_norm_bound(&self) -> Option<f32> {
        self.max_norm.map(|m| m.bound)
    }

    fn eligible(&self, param: &Parameter) -> bool {
        param.role == ParamRole::Weight
            && param.requires_grad
            && param.value.ndim() >= 2
            && match self.scope {
                RegularizationScope::All => true,
                RegularizationScope::Classifier => param.classifier,
            }
    }

    /// Apply after an optimizer step taken during `epoch`.
    ///
    /// Max-norm projection runs first; tau-normalization follows on epochs
    /// divisible by its frequency.
    pub fn apply(&self, params: &mut [Parameter], epoch: usize) -> RegularizationReport {
        let mut report = RegularizationReport::default();
        let tau_norm = self.tau_norm.filter(|t| epoch % t.every == 0);
        if self.max_norm.is_none() && tau_norm.is_none() {
            return report;
        }
        for param in params.iter_mut().filter(|p| self.eligible(p)) {
            if let Some(m) = self.max_norm {
                report.projected_rows += project_max_norm(param, m.bound, m.p);
            }
            if let Some(t) = tau_norm {
                report.normalized_rows += tau_normalize(param, t.tau, t.p);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaxNormSpec, TauNormSpec};
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array2};
    use proptest::prelude::*;

    fn weight(rows: Array2<f32>) -> Parameter {
        Parameter::new("fc.weight", ParamRole::Weight, rows.into_dyn())
    }

    fn row_norms(param: &Parameter, p: f32) -> Vec<f32> {
        let shape = param.value.shape();
        let cols: usize = shape[1..].iter().product();
        let view = param.value.view().into_shape_with_order((shape[0], cols)).unwrap();
        view.rows().into_iter().map(|r| lp_norm(r, p)).collect()
    }

    fn spec(max_norm: bool, tau_norm: bool) -> RegularizationSpec {
        RegularizationSpec {
            max_norm: MaxNormSpec { enabled: max_norm, thresh: 0.5, lp_norm: 2.0, tau: 2.0 },
            tau_normalization: TauNormSpec { enabled: tau_norm, lp_norm: 2.0, tau: 3.0, apply_frequency: 2 },
            ..Default::default()
        }
    }

    #[test]
    fn test_lp_norms() {
        let v = arr1(&[3.0f32, -4.0]);
        assert_abs_diff_eq!(lp_norm(v.view(), 1.0), 7.0);
        assert_abs_diff_eq!(lp_norm(v.view(), 2.0), 5.0);
        assert_abs_diff_eq!(lp_norm(v.view(), f32::INFINITY), 4.0);
        assert_abs_diff_eq!(lp_norm(v.view(), 3.0), 91.0f32.powf(1.0 / 3.0), epsilon = 1e-5);
    }

    #[test]
    fn test_max_norm_rescales_only_large_rows() {
        let mut p = weight(arr2(&[[3.0, 4.0], [0.3, 0.4]]));
        assert_eq!(project_max_norm(&mut p, 1.0, 2.0), 1);
        assert_abs_diff_eq!(p.value[[0, 0]], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(p.value[[0, 1]], 0.8, epsilon = 1e-6);
        assert_eq!(p.value[[1, 0]], 0.3);
        assert_eq!(p.value[[1, 1]], 0.4);
    }

    #[test]
    fn test_conv_kernel_rows() {
        // [out=2, in=1, 2, 2] flattens to two rows of four
        let value = ndarray::Array4::from_shape_vec((2, 1, 2, 2), vec![2.0, 2.0, 2.0, 2.0, 0.1, 0.1, 0.1, 0.1])
            .unwrap()
            .into_dyn();
        let mut p = Parameter::new("conv.weight", ParamRole::Weight, value);
        project_max_norm(&mut p, 1.0, 2.0);
        let norms = row_norms(&p, 2.0);
        assert_abs_diff_eq!(norms[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(norms[1], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_tau_normalize_skips_zero_rows() {
        let mut p = weight(arr2(&[[0.0, 0.0], [1.0, 1.0]]));
        assert_eq!(tau_normalize(&mut p, 2.0, 2.0), 1);
        assert_eq!(p.value[[0, 0]], 0.0);
        assert_abs_diff_eq!(row_norms(&p, 2.0)[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_policy_skips_bias_norm_frozen_and_vectors() {
        let policy = RegularizationPolicy::from_spec(&spec(true, false));
        let big = || arr2(&[[10.0f32, 10.0]]).into_dyn();
        let mut params = vec![
            Parameter::new("fc.bias", ParamRole::Bias, big()),
            Parameter::new("bn.weight", ParamRole::Norm, big()),
            Parameter::new("vec", ParamRole::Weight, arr1(&[10.0f32, 10.0]).into_dyn()),
            Parameter::new("frozen", ParamRole::Weight, big()),
        ];
        params[3].requires_grad = false;
        let report = policy.apply(&mut params, 0);
        assert_eq!(report, RegularizationReport::default());
        assert!(params.iter().all(|p| p.value.iter().all(|&x| x == 10.0)));
    }

    #[test]
    fn test_classifier_scope() {
        let mut s = spec(true, false);
        s.scope = RegularizationScope::Classifier;
        let policy = RegularizationPolicy::from_spec(&s);
        let mut params = vec![
            weight(arr2(&[[10.0, 10.0]])),
            weight(arr2(&[[10.0, 10.0]])).in_classifier(),
        ];
        policy.apply(&mut params, 0);
        assert_eq!(params[0].value[[0, 0]], 10.0);
        assert_abs_diff_eq!(row_norms(&params[1], 2.0)[0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_tau_frequency_and_order() {
        let policy = RegularizationPolicy::from_spec(&spec(true, true));
        assert_eq!(policy.max_norm_bound(), Some(1.0));

        let mut params = vec![weight(arr2(&[[6.0, 8.0]]))];
        let report = policy.apply(&mut params, 1);
        assert_eq!(report.normalized_rows, 0);
        assert_abs_diff_eq!(row_norms(&params[0], 2.0)[0], 1.0, epsilon = 1e-5);

        // Epoch 2: projection to 1.0 then normalization to tau = 3.0
        let mut params = vec![weight(arr2(&[[6.0, 8.0]]))];
        let report = policy.apply(&mut params, 2);
        assert_eq!(report, RegularizationReport { projected_rows: 1, normalized_rows: 1 });
        assert_abs_diff_eq!(row_norms(&params[0], 2.0)[0], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_disabled_policy() {
        let policy = RegularizationPolicy::disabled();
        assert!(!policy.is_active());
        let mut params = vec![weight(arr2(&[[6.0, 8.0]]))];
        policy.apply(&mut params, 0);
        assert_eq!(params[0].value[[0, 1]], 8.0);
    }

    fn matrix() -> impl Strategy<Value = Array2<f32>> {
        (1usize..6, 1usize..8).prop_flat_map(|(r, c)| {
            prop::collection::vec(-50.0f32..50.0, r * c)
                .prop_map(move |v| Array2::from_shape_vec((r, c), v).unwrap())
        })
    }

    fn order() -> impl Strategy<Value = f32> {
        prop_oneof![Just(1.0f32), Just(2.0f32), Just(3.0f32), Just(f32::INFINITY)]
    }

    proptest! {
        #[test]
        fn prop_max_norm_bounds_every_row(m in matrix(), bound in 0.01f32..10.0, p in order()) {
            let mut param = weight(m);
            project_max_norm(&mut param, bound, p);
            for norm in row_norms(&param, p) {
                prop_assert!(norm <= bound * (1.0 + 1e-4) + 1e-6);
            }
        }

        #[test]
        fn prop_max_norm_is_idempotent(m in matrix(), bound in 0.01f32..10.0, p in order()) {
            let mut param = weight(m);
            project_max_norm(&mut param, bound, p);
            let once = param.value.clone();
            let norms = row_norms(&param, p);
            project_max_norm(&mut param, bound, p);
            for ((row, before), norm) in param.value.outer_iter().zip(once.outer_iter()).zip(norms) {
                if norm <= bound {
                    prop_assert_eq!(row, before);
                }
            }
        }

        #[test]
        fn prop_tau_normalization_hits_tau(m in matrix(), tau in 0.1f32..5.0, p in order()) {
            let mut param = weight(m);
            let zero_rows: Vec<bool> = row_norms(&param, p).iter().map(|&n| n == 0.0).collect();
            tau_normalize(&mut param, tau, p);
            for (norm, zero) in row_norms(&param, p).into_iter().zip(zero_rows) {
                if !zero {
                    prop_assert!((norm - tau).abs() <= tau * 1e-4);
                }
            }
        }
    }
}
