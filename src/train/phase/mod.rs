//! One training phase: optimizer, schedule, sampler and stopping policy
//! wired into an epoch loop over a shared model.

mod epoch;
mod state;


pub use epoch::evaluate;
pub use state::{EpochSummary, PhaseReport, PhaseStatus, StopSignal, TrainingState};

use super::criterion::CriterionSchedule;
use super::plateau::{PlateauController, PlateauDecision};
use super::regularization::RegularizationPolicy;
use super::sink::MetricsSink;
use crate::config::PhaseConfig;
use crate::data::{sample_weights, BatchLoader, DrawStrategy, EpochSampler, RemappedDataset, Sample, Split};
use crate::error::{Error, Result};
use crate::model::{ClassifierModel, ModelError};
use crate::optim::{build_lr_policy, build_optimizer, LrPolicy, Optimizer};
use ndarray::ArrayD;
use std::sync::Arc;

/// Training and validation splits shared by every phase.
#[derive(Debug, Clone)]
pub struct PhaseData {
    pub train: Arc<[Sample]>,
    pub val: Arc<[Sample]>,
    pub train_labels: Vec<usize>,
    pub class_counts: Vec<usize>,
    pub num_classes: usize,
}

impl PhaseData {
    pub fn from_dataset(dataset: &RemappedDataset) -> Self {
        Self {
            train: dataset.train.clone().into(),
            val: dataset.val.clone().into(),
            train_labels: dataset.labels(Split::Train),
            class_counts: dataset.class_counts(Split::Train),
            num_classes: dataset.num_classes(),
        }
    }
}

/// Components rebuilt from scratch at the start of every phase.
struct PhaseParts {
    criterion: CriterionSchedule,
    optimizer: Box<dyn Optimizer>,
    lr_policy: LrPolicy,
    sampler: EpochSampler,
    regularization: RegularizationPolicy,
    plateau: PlateauController,
}

/// Runs one resolved [`PhaseConfig`] against a model.
pub struct PhaseRunner<'a> {
    index: usize,
    config: &'a PhaseConfig,
    data: &'a PhaseData,
    loader: &'a BatchLoader,
    seed: u64,
    stop: StopSignal,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(index: usize, config: &'a PhaseConfig, data: &'a PhaseData, loader: &'a BatchLoader, seed: u64) -> Self {
        Self { index, config, data, loader, seed, stop: StopSignal::new() }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    fn model_error(&self, err: ModelError) -> Error {
        Error::Model { phase: self.index, message: err.message }
    }

    /// Build every per-phase component. Fails before the first epoch on an
    /// unknown criterion, optimizer or scheduler.
    fn build_parts(&self) -> Result<PhaseParts> {
        let cfg = self.config;
        let criterion = CriterionSchedule::from_phase(cfg, &self.data.class_counts)?;
        let optimizer = build_optimizer(&cfg.optimizer)?;
        let lr_policy = build_lr_policy(&cfg.scheduler, cfg.optimizer.lr, cfg.training.num_epochs)?;

        let sampler_spec = &cfg.weighted_random_sampler;
        let strategy = if sampler_spec.enabled {
            let weights = sample_weights(&self.data.train_labels, self.data.num_classes, sampler_spec)?;
            DrawStrategy::Weighted { weights, replacement: sampler_spec.replacement }
        } else {
            DrawStrategy::Shuffle
        };
        let sampler = EpochSampler::new(self.data.train.len(), cfg.training.train_ratio, self.seed, strategy);

        let plateau = PlateauController::new(&cfg.scheduler, cfg.training.patience, lr_policy.is_plateau());
        Ok(PhaseParts {
            criterion,
            optimizer,
            lr_policy,
            sampler,
            regularization: RegularizationPolicy::from_spec(&cfg.regularization),
            plateau,
        })
    }

    fn apply_freeze(&self, model: &mut dyn ClassifierModel) -> (usize, usize) {
        let freeze = self.config.training.freeze_backbone;
        let (frozen, trainable) = model.set_backbone_frozen(freeze);
        if freeze {
            if trainable == 0 {
                tracing::warn!(phase = %self.config.name, "no trainable parameters left after freezing the backbone");
            }
            if frozen == 0 {
                tracing::warn!(phase = %self.config.name, "freeze_backbone is set but no parameter was frozen");
            }
        }
        (frozen, trainable)
    }

    /// Run the phase to completion, early stop, divergence or interruption.
    ///
    /// Divergence is reported through [`PhaseStatus::Diverged`]; every other
    /// error is returned.
    pub fn run(&self, model: &mut dyn ClassifierModel, sink: &mut dyn MetricsSink) -> Result<PhaseReport> {
        let cfg = self.config;
        let mut parts = self.build_parts()?;
        let (frozen, trainable) = self.apply_freeze(model);

        tracing::info!(
            phase = %cfg.name,
            index = self.index,
            epochs = cfg.training.num_epochs,
            optimizer = parts.optimizer.name(),
            lr = parts.optimizer.lr(),
            draws = parts.sampler.draws_per_epoch(),
            weighted = parts.sampler.is_weighted(),
            frozen,
            trainable,
            "starting phase"
        );

        // Rollback target on divergence: the best weights when they are kept,
        // otherwise the weights after the last completed epoch.
        let mut last_good: Vec<ArrayD<f32>> = model.snapshot();
        let mut report = PhaseReport {
            index: self.index,
            name: cfg.name.clone(),
            status: PhaseStatus::Completed,
            state: TrainingState::new(parts.optimizer.lr()),
            best_epoch: None,
            lr_reductions: 0,
            frozen_params: frozen,
            trainable_params: trainable,
            history: Vec::new(),
        };

        for epoch in 0..cfg.training.num_epochs {
            if self.stop.is_triggered() {
                tracing::info!(phase = %cfg.name, epoch, "stop requested, ending phase");
                report.status = PhaseStatus::Interrupted { epoch };
                break;
            }

            let (summary, decision) = match self.run_epoch(model, &mut parts, epoch, sink) {
                Ok(outcome) => outcome,
                Err(err) if err.is_phase_local() => {
                    tracing::error!(phase = %cfg.name, error = %err, "phase diverged, restoring last good weights");
                    model.restore(&last_good);
                    let batch = match &err {
                        Error::TrainingDivergence { batch, .. } => *batch,
                        _ => 0,
                    };
                    report.status = PhaseStatus::Diverged { epoch, batch, message: err.to_string() };
                    break;
                }
                Err(err) => return Err(err),
            };

            report.state = TrainingState {
                epoch,
                best_metric: parts.plateau.best(),
                epochs_since_improvement: parts.plateau.epochs_since_improvement(),
                current_lr: parts.optimizer.lr(),
            };
            report.lr_reductions = parts.plateau.reductions();
            report.history.push(summary);

            if decision.improved {
                report.best_epoch = Some(epoch);
                sink.checkpoint(&cfg.name, epoch, model.parameters());
            }
            if decision.improved || !cfg.training.restore_best_weights {
                last_good = model.snapshot();
            }
            if decision.stop {
                tracing::info!(
                    phase = %cfg.name,
                    epoch,
                    patience = cfg.training.patience,
                    best = ?parts.plateau.best(),
                    "early stopping"
                );
                report.status = PhaseStatus::EarlyStopped { epoch };
                break;
            }
        }

        let finished_normally = matches!(report.status, PhaseStatus::Completed | PhaseStatus::EarlyStopped { .. });
        if finished_normally && cfg.training.restore_best_weights {
            if let Some(best_epoch) = report.best_epoch {
                if best_epoch != report.state.epoch {
                    tracing::info!(phase = %cfg.name, best_epoch, "restoring best weights");
                    model.restore(&last_good);
                }
            }
        }

        tracing::info!(
            phase = %cfg.name,
            status = ?report.status,
            epochs = report.epochs_run(),
            best = ?report.state.best_metric,
            "phase finished"
        );
        Ok(report)
    }

    /// Train, validate, then let the plateau controller and LR policy react.
    fn run_epoch(
        &self,
        model: &mut dyn ClassifierModel,
        parts: &mut PhaseParts,
        epoch: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<(EpochSummary, PlateauDecision)> {
        let cfg = self.config;
        let stage = parts.criterion.begin_epoch(epoch);
        let lr = parts.optimizer.lr();

        let (train, nonfinite_batches) = self.train_epoch(model, parts, epoch)?;
        let val = evaluate(
            model,
            self.loader,
            Arc::clone(&self.data.val),
            Split::Val,
            parts.criterion.active(),
            self.data.num_classes,
        )
        .map_err(|e| self.model_error(e))?;

        for (name, value) in train.named() {
            sink.record(&cfg.name, epoch, &format!("train_{name}"), value);
        }
        for (name, value) in val.named() {
            sink.record(&cfg.name, epoch, &format!("val_{name}"), value);
        }
        sink.record(&cfg.name, epoch, "lr", f64::from(lr));

        let monitored = val.monitored(cfg.training.monitor) as f32;
        let decision = parts.plateau.observe(monitored, lr);
        match &mut parts.lr_policy {
            LrPolicy::ReduceOnPlateau => {
                if let Some(new_lr) = decision.new_lr {
                    parts.optimizer.set_lr(new_lr);
                }
            }
            LrPolicy::Epochwise(schedule) => {
                schedule.step();
                schedule.apply(parts.optimizer.as_mut());
            }
        }

        tracing::info!(
            phase = %cfg.name,
            epoch,
            train_loss = train.loss,
            val_loss = val.loss,
            val_acc = val.accuracy,
            val_acc_macro = val.acc_macro,
            monitor = cfg.training.monitor.as_str(),
            improved = decision.improved,
            lr,
            "epoch complete"
        );

        let summary = EpochSummary { epoch, stage, lr, train, val, nonfinite_batches };
        Ok((summary, decision))
    }
}
