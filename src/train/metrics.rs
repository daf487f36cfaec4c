//! Classification metrics over integer labels
//!
//! Macro averages run over every class that has support or received a
//! prediction; a class with no predictions has precision 0.

use crate::config::Monitor;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Index of the largest logit in each row.
pub fn argmax_rows(logits: ArrayView2<'_, f32>) -> Vec<usize> {
    logits
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (j, &v)| if v > best.1 { (j, v) } else { best })
                .0
        })
        .collect()
}

/// `counts[target][prediction]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes, counts: vec![0; num_classes * num_classes] }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Record one prediction. Out-of-range labels are ignored.
    pub fn add(&mut self, target: usize, prediction: usize) {
        if target < self.num_classes && prediction < self.num_classes {
            self.counts[target * self.num_classes + prediction] += 1;
        }
    }

    pub fn extend(&mut self, targets: &[usize], predictions: &[usize]) {
        for (&t, &p) in targets.iter().zip(predictions) {
            self.add(t, p);
        }
    }

    pub fn get(&self, target: usize, prediction: usize) -> usize {
        self.counts[target * self.num_classes + prediction]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Examples whose target is `class`.
    pub fn support(&self, class: usize) -> usize {
        (0..self.num_classes).map(|p| self.get(class, p)).sum()
    }

    fn predicted(&self, class: usize) -> usize {
        (0..self.num_classes).map(|t| self.get(t, class)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.num_classes).map(|c| self.get(c, c)).sum();
        correct as f64 / total as f64
    }

    /// Per-class (precision, recall, f1, support).
    pub fn per_class(&self) -> Vec<ClassScores> {
        (0..self.num_classes)
            .map(|c| {
                let tp = self.get(c, c) as f64;
                let support = self.support(c);
                let predicted = self.predicted(c);
                let precision = if predicted == 0 { 0.0 } else { tp / predicted as f64 };
                let recall = if support == 0 { 0.0 } else { tp / support as f64 };
                let f1 = if precision + recall == 0.0 { 0.0 } else { 2.0 * precision * recall / (precision + recall) };
                ClassScores { precision, recall, f1, support, predicted }
            })
            .collect()
    }
}

/// Scores of a single class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
    pub predicted: usize,
}

/// Aggregated metrics for one pass over a split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
    /// Mean per-class recall
    pub acc_macro: f64,
    pub precision_macro: f64,
    pub recall_macro: f64,
    pub f1_macro: f64,
    pub precision_weighted: f64,
    pub recall_weighted: f64,
    pub f1_weighted: f64,
    pub samples: usize,
}

impl EpochMetrics {
    /// Metrics from a confusion matrix and the mean loss of the pass.
    pub fn from_confusion(confusion: &ConfusionMatrix, loss: f64) -> Self {
        let scores = confusion.per_class();
        let present: Vec<&ClassScores> = scores.iter().filter(|s| s.support > 0 || s.predicted > 0).collect();
        let total = confusion.total();

        let macro_of = |f: fn(&ClassScores) -> f64| {
            if present.is_empty() {
                0.0
            } else {
                present.iter().map(|s| f(s)).sum::<f64>() / present.len() as f64
            }
        };
        let weighted_of = |f: fn(&ClassScores) -> f64| {
            if total == 0 {
                0.0
            } else {
                scores.iter().map(|s| f(s) * s.support as f64).sum::<f64>() / total as f64
            }
        };

        let recall_macro = macro_of(|s| s.recall);
        Self {
            loss,
            accuracy: confusion.accuracy(),
            acc_macro: recall_macro,
            precision_macro: macro_of(|s| s.precision),
            recall_macro,
            f1_macro: macro_of(|s| s.f1),
            precision_weighted: weighted_of(|s| s.precision),
            recall_weighted: weighted_of(|s| s.recall),
            f1_weighted: weighted_of(|s| s.f1),
            samples: total,
        }
    }

    /// Value of the monitored validation metric.
    pub fn monitored(&self, monitor: Monitor) -> f64 {
        match monitor {
            Monitor::ValAccMacro => self.acc_macro,
            Monitor::ValAcc => self.accuracy,
            Monitor::ValF1Macro => self.f1_macro,
            Monitor::ValF1Weighted => self.f1_weighted,
            Monitor::ValLoss => self.loss,
        }
    }

    /// `(name, value)` pairs as reported to a metrics sink.
    pub fn named(&self) -> [(&'static str, f64); 9] {
        [
            ("loss", self.loss),
            ("acc", self.accuracy),
            ("acc_macro", self.acc_macro),
            ("precision_macro", self.precision_macro),
            ("recall_macro", self.recall_macro),
            ("f1_macro", self.f1_macro),
            ("precision_weighted", self.precision_weighted),
            ("recall_weighted", self.recall_weighted),
            ("f1_weighted", self.f1_weighted),
        ]
    }
}

/// Running loss and confusion matrix for one pass.
#[derive(Debug, Clone)]
pub struct MetricAccumulator {
    confusion: ConfusionMatrix,
    loss_sum: f64,
    loss_count: usize,
}

impl MetricAccumulator {
    pub fn new(num_classes: usize) -> Self {
        Self { confusion: ConfusionMatrix::new(num_classes), loss_sum: 0.0, loss_count: 0 }
    }

    /// Add one batch with its mean loss.
    pub fn update(&mut self, logits: ArrayView2<'_, f32>, targets: &[usize], mean_loss: f32) {
        let predictions = argmax_rows(logits);
        self.confusion.extend(targets, &predictions);
        self.loss_sum += f64::from(mean_loss) * targets.len() as f64;
        self.loss_count += targets.len();
    }

    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    pub fn finish(&self) -> EpochMetrics {
        let loss = if self.loss_count == 0 { f64::NAN } else { self.loss_sum / self.loss_count as f64 };
        EpochMetrics::from_confusion(&self.confusion, loss)
    }
}
