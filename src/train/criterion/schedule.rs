//! Two-stage criterion schedule

use super::{build_criterion, Criterion, LossOutput};
use crate::config::PhaseConfig;
use crate::error::ConfigError;
use ndarray::ArrayView2;
use serde::Serialize;

/// Active stage. Only `A → B` is ever taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    A,
    B,
}

/// Selects the loss for each epoch.
///
/// Starts in [`Stage::B`] when the switch epoch is 0 and a second criterion
/// exists; without a second criterion it stays in [`Stage::A`] for the whole
/// phase.
pub struct CriterionSchedule {
    a: Box<dyn Criterion>,
    b: Option<Box<dyn Criterion>>,
    switch_epoch: usize,
    stage: Stage,
}

impl CriterionSchedule {
    /// Single-criterion schedule.
    pub fn single(a: Box<dyn Criterion>) -> Self {
        Self { a, b: None, switch_epoch: 0, stage: Stage::A }
    }

    /// Switch from `a` to `b` at `switch_epoch`.
    pub fn two_stage(a: Box<dyn Criterion>, b: Box<dyn Criterion>, switch_epoch: usize) -> Self {
        let stage = if switch_epoch == 0 { Stage::B } else { Stage::A };
        Self { a, b: Some(b), switch_epoch, stage }
    }

    /// Build from a resolved phase. Unknown identifiers fail here, before
    /// the first epoch runs.
    pub fn from_phase(phase: &PhaseConfig, class_counts: &[usize]) -> Result<Self, ConfigError> {
        let a = build_criterion("criterion_a", &phase.criterion_a, &phase.criterion_a_params, class_counts)?;
        match &phase.criterion_b {
            Some(kind) => {
                let b = build_criterion("criterion_b", kind, &phase.criterion_b_params, class_counts)?;
                Ok(Self::two_stage(a, b, phase.first_stage_epochs))
            }
            None => Ok(Self::single(a)),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn switch_epoch(&self) -> Option<usize> {
        self.b.as_ref().map(|_| self.switch_epoch)
    }

    /// Advance to `epoch`; returns the stage in effect for it.
    pub fn begin_epoch(&mut self, epoch: usize) -> Stage {
        if self.stage == Stage::A && self.b.is_some() && epoch >= self.switch_epoch {
            self.stage = Stage::B;
            tracing::info!(
                epoch,
                from = self.a.name(),
                to = self.active().name(),
                "switching criterion"
            );
        }
        self.stage
    }

    /// Criterion of the current stage.
    pub fn active(&self) -> &dyn Criterion {
        match (self.stage, &self.b) {
            (Stage::B, Some(b)) => b.as_ref(),
            _ => self.a.as_ref(),
        }
    }

    pub fn loss(&self, logits: ArrayView2<'_, f32>, targets: &[usize]) -> LossOutput {
        self.active().compute(logits, targets)
    }
}
