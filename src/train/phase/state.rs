//! Phase state: per-epoch training state, terminal status and report types

use crate::train::criterion::Stage;
use crate::train::metrics::EpochMetrics;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutable state of one phase, updated only between epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingState {
    /// Last completed epoch (0-based)
    pub epoch: usize,
    pub best_metric: Option<f32>,
    pub epochs_since_improvement: usize,
    pub current_lr: f32,
}

impl TrainingState {
    pub fn new(lr: f32) -> Self {
        Self { epoch: 0, best_metric: None, epochs_since_improvement: 0, current_lr: lr }
    }
}

/// How a phase ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Ran every configured epoch
    Completed,
    /// Early-stopping patience exhausted after `epoch`
    EarlyStopped { epoch: usize },
    /// Non-finite loss; weights were rolled back to the last good snapshot
    Diverged { epoch: usize, batch: usize, message: String },
    /// Stop signal observed before `epoch` started
    Interrupted { epoch: usize },
}

impl PhaseStatus {
    /// Whether later phases must not run.
    pub fn halts_run(&self) -> bool {
        matches!(self, PhaseStatus::Interrupted { .. })
    }
}

/// Metrics of one completed epoch.
#[derive(Debug, Clone, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub stage: Stage,
    pub lr: f32,
    pub train: EpochMetrics,
    pub val: EpochMetrics,
    /// Batches skipped for a non-finite loss or gradient
    pub nonfinite_batches: usize,
}

/// Result of one phase, handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub index: usize,
    pub name: String,
    pub status: PhaseStatus,
    pub state: TrainingState,
    pub best_epoch: Option<usize>,
    pub lr_reductions: usize,
    pub frozen_params: usize,
    pub trainable_params: usize,
    pub history: Vec<EpochSummary>,
}

impl PhaseReport {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }
}

/// Cooperative stop request, polled at epoch boundaries.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
