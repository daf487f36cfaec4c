//! Plateau Controller: learning-rate reduction and early stopping
//!
//! Two counters run side by side. The plateau counter drives LR reduction and
//! is reset after every reduction; the early-stop counter only resets when the
//! monitored metric actually improves.

use crate::config::{PlateauMode, SchedulerSpec, ThresholdMode};

/// Outcome of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauDecision {
    /// The metric beat the best value by more than the threshold
    pub improved: bool,
    /// Reduced learning rate to apply, if a reduction fired
    pub new_lr: Option<f32>,
    /// Early-stopping patience is exhausted
    pub stop: bool,
}

/// Tracks the monitored metric across epochs of one phase.
#[derive(Debug, Clone)]
pub struct PlateauController {
    mode: PlateauMode,
    threshold: f32,
    threshold_mode: ThresholdMode,
    factor: f32,
    patience: usize,
    cooldown: usize,
    min_lr: f32,
    reduce_lr: bool,
    stop_patience: usize,

    best: Option<f32>,
    num_bad_epochs: usize,
    epochs_since_improvement: usize,
    cooldown_counter: usize,
    reductions: usize,
}

impl PlateauController {
    /// Controller configured from a scheduler block.
    ///
    /// `reduce_lr` is false when another schedule owns the learning rate; the
    /// controller then only tracks improvement and early stopping.
    pub fn new(spec: &SchedulerSpec, stop_patience: usize, reduce_lr: bool) -> Self {
        Self {
            mode: spec.mode,
            threshold: spec.threshold,
            threshold_mode: spec.threshold_mode,
            factor: spec.factor,
            patience: spec.patience,
            cooldown: spec.cooldown,
            min_lr: spec.min_lr,
            reduce_lr,
            stop_patience,
            best: None,
            num_bad_epochs: 0,
            epochs_since_improvement: 0,
            cooldown_counter: 0,
            reductions: 0,
        }
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    pub fn epochs_since_improvement(&self) -> usize {
        self.epochs_since_improvement
    }

    /// Plateau counter; reset on improvement and after each reduction.
    pub fn num_bad_epochs(&self) -> usize {
        self.num_bad_epochs
    }

    pub fn reductions(&self) -> usize {
        self.reductions
    }

    fn is_better(&self, value: f32, best: f32) -> bool {
        match (self.mode, self.threshold_mode) {
            (PlateauMode::Max, ThresholdMode::Rel) => value > best * (1.0 + self.threshold),
            (PlateauMode::Max, ThresholdMode::Abs) => value > best + self.threshold,
            (PlateauMode::Min, ThresholdMode::Rel) => value < best * (1.0 - self.threshold),
            (PlateauMode::Min, ThresholdMode::Abs) => value < best - self.threshold,
        }
    }

    /// Feed the metric of one validation pass taken at learning rate `lr`.
    pub fn observe(&mut self, metric: f32, lr: f32) -> PlateauDecision {
        let improved = metric.is_finite() && self.best.map_or(true, |best| self.is_better(metric, best));
        if improved {
            self.best = Some(metric);
            self.num_bad_epochs = 0;
            self.epochs_since_improvement = 0;
        } else {
            self.num_bad_epochs += 1;
            self.epochs_since_improvement += 1;
        }

        let in_cooldown = self.cooldown_counter > 0;
        if in_cooldown {
            self.cooldown_counter -= 1;
            self.num_bad_epochs = 0;
        }

        let mut new_lr = None;
        if self.reduce_lr && !improved && !in_cooldown && self.num_bad_epochs >= self.patience {
            let reduced = (lr * self.factor).max(self.min_lr);
            if lr - reduced > f32::EPSILON * lr.abs() {
                new_lr = Some(reduced);
                self.reductions += 1;
                tracing::info!(from = lr, to = reduced, "reducing learning rate on plateau");
            }
            self.cooldown_counter = self.cooldown;
            self.num_bad_epochs = 0;
        }

        let stop = self.epochs_since_improvement >= self.stop_patience && !improved;
        PlateauDecision { improved, new_lr, stop }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn spec(patience: usize, factor: f32, min_lr: f32) -> SchedulerSpec {
        SchedulerSpec { patience, factor, min_lr, ..Default::default() }
    }

    fn run(controller: &mut PlateauController, metrics: &[f32], mut lr: f32) -> (f32, Vec<PlateauDecision>) {
        let decisions = metrics
            .iter()
            .map(|&m| {
                let d = controller.observe(m, lr);
                if let Some(new) = d.new_lr {
                    lr = new;
                }
                d
            })
            .collect();
        (lr, decisions)
    }

    #[test]
    fn test_flat_metric_reduces_exactly_once() {
        let mut controller = PlateauController::new(&spec(5, 0.5, 1e-6), 100, true);
        let (lr, decisions) = run(&mut controller, &[0.70; 6], 0.01);

        assert_eq!(controller.reductions(), 1);
        assert!(decisions[..5].iter().all(|d| d.new_lr.is_none()));
        assert_eq!(decisions[5].new_lr, Some(0.005));
        assert_abs_diff_eq!(lr, 0.005);
        // Plateau counter resets, early-stop counter does not
        assert_eq!(controller.num_bad_epochs(), 0);
        assert_eq!(controller.epochs_since_improvement(), 5);
    }

    #[test]
    fn test_min_lr_floor() {
        let mut controller = PlateauController::new(&spec(1, 0.1, 1e-3), 100, true);
        let (lr, _) = run(&mut controller, &[0.5, 0.5, 0.5, 0.5, 0.5], 0.05);
        assert_abs_diff_eq!(lr, 1e-3);
        // No further reduction once at the floor
        assert_eq!(controller.reductions(), 2);
    }

    #[test]
    fn test_relative_threshold() {
        let mut controller = PlateauController::new(&SchedulerSpec { threshold: 0.1, ..Default::default() }, 10, true);
        assert!(controller.observe(0.5, 0.1).improved);
        // 0.54 < 0.5 * 1.1
        assert!(!controller.observe(0.54, 0.1).improved);
        assert!(controller.observe(0.56, 0.1).improved);
        assert_eq!(controller.best(), Some(0.56));
    }

    #[test]
    fn test_min_mode_absolute_threshold() {
        let s = SchedulerSpec {
            mode: PlateauMode::Min,
            threshold_mode: ThresholdMode::Abs,
            threshold: 0.05,
            ..Default::default()
        };
        let mut controller = PlateauController::new(&s, 10, true);
        assert!(controller.observe(1.0, 0.1).improved);
        assert!(!controller.observe(0.97, 0.1).improved);
        assert!(controller.observe(0.9, 0.1).improved);
    }

    #[test]
    fn test_early_stop_after_patience() {
        let mut controller = PlateauController::new(&spec(100, 0.5, 0.0), 3, true);
        let (_, decisions) = run(&mut controller, &[0.9, 0.8, 0.8, 0.8], 0.1);
        let stops: Vec<bool> = decisions.iter().map(|d| d.stop).collect();
        assert_eq!(stops, vec![false, false, false, true]);
    }

    #[test]
    fn test_cooldown_delays_next_reduction() {
        let s = SchedulerSpec { patience: 1, factor: 0.5, cooldown: 2, ..Default::default() };
        let mut controller = PlateauController::new(&s, 100, true);
        let (_, decisions) = run(&mut controller, &[1.0, 1.0, 1.0, 1.0, 1.0], 1.0);
        let fired: Vec<bool> = decisions.iter().map(|d| d.new_lr.is_some()).collect();
        assert_eq!(fired, vec![false, true, false, false, true]);
    }

    #[test]
    fn test_tracking_only_never_reduces() {
        let mut controller = PlateauController::new(&spec(1, 0.5, 0.0), 100, false);
        let (lr, _) = run(&mut controller, &[0.3; 10], 0.1);
        assert_eq!(lr, 0.1);
        assert_eq!(controller.reductions(), 0);
    }

    #[test]
    fn test_nan_is_never_an_improvement() {
        let mut controller = PlateauController::new(&spec(5, 0.5, 0.0), 5, true);
        assert!(!controller.observe(f32::NAN, 0.1).improved);
        assert_eq!(controller.best(), None);
        assert!(controller.observe(0.1, 0.1).improved);
    }

    proptest! {
        #[test]
        fn prop_lr_never_below_floor(
            metrics in prop::collection::vec(0.0f32..1.0, 1..60),
            patience in 0usize..4,
            factor in 0.05f32..0.95,
        ) {
            let mut controller = PlateauController::new(&spec(patience, factor, 1e-4), 1000, true);
            let (lr, decisions) = run(&mut controller, &metrics, 0.1);
            prop_assert!(lr >= 1e-4);
            for d in decisions {
                if d.improved {
                    prop_assert!(!d.stop);
                }
            }
        }

        #[test]
        fn prop_stop_counter_matches_stagnation(metrics in prop::collection::vec(0.0f32..1.0, 1..40)) {
            let mut controller = PlateauController::new(&spec(3, 0.5, 0.0), 1000, true);
            let mut since = 0usize;
            for m in metrics {
                let d = controller.observe(m, 0.1);
                since = if d.improved { 0 } else { since + 1 };
                prop_assert_eq!(controller.epochs_since_improvement(), since);
            }
        }
    }
}
