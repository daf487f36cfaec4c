//! Phase Orchestrator: composes the dataset, builds the model and runs every
//! resolved phase strictly in order.
//!
//! Only trained weights carry over between phases. A phase that diverges is
//! recorded and the run moves on; an interrupted phase ends the run.

use super::criterion::{CriterionSchedule, CrossEntropy};
use super::metrics::EpochMetrics;
use super::phase::{evaluate, PhaseData, PhaseReport, PhaseRunner, PhaseStatus, StopSignal};
use super::sink::MetricsSink;
use crate::config::{validate_phase, PhaseConfig, RunConfig};
use crate::data::{class_weights, compose, BatchLoader, ClassRemapper, LoaderOptions, RemappedDataset, Split};
use crate::error::{ConfigError, Error, Result};
use crate::model::{ClassifierModel, ImageLoader, ModelFactory};
use serde::Serialize;
use std::sync::Arc;

/// Where the run is in its phase sequence. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStage {
    Ready { next: usize },
    Interrupted { at: usize },
    Finished,
}

impl RunStage {
    fn after(self, status: &PhaseStatus, num_phases: usize) -> Self {
        match self {
            RunStage::Ready { next } if status.halts_run() => RunStage::Interrupted { at: next },
            RunStage::Ready { next } if next + 1 < num_phases => RunStage::Ready { next: next + 1 },
            RunStage::Ready { .. } => RunStage::Finished,
            terminal => terminal,
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub class_names: Vec<String>,
    pub train_class_counts: Vec<usize>,
    pub phases: Vec<PhaseReport>,
    /// Test-split metrics after the last phase; absent for an empty test split
    pub test: Option<EpochMetrics>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Phases that ended in divergence.
    pub fn diverged(&self) -> impl Iterator<Item = &PhaseReport> {
        self.phases.iter().filter(|p| matches!(p.status, PhaseStatus::Diverged { .. }))
    }
}

/// Trained model plus its report.
pub struct RunOutcome {
    pub model: Box<dyn ClassifierModel>,
    pub report: RunReport,
}

/// Compose every source and apply the class remapping once.
pub fn prepare_dataset(config: &RunConfig) -> Result<RemappedDataset> {
    let run = &config.run;
    let composed = compose(&run.dataset.sources, run.class_names.as_deref())?;
    let remapper = ClassRemapper::new(&run.class_remapping, &composed.class_names)?;
    let dataset = remapper.apply(composed);
    tracing::info!(
        train = dataset.train.len(),
        val = dataset.val.len(),
        test = dataset.test.len(),
        classes = dataset.num_classes(),
        "dataset ready"
    );
    Ok(dataset)
}

/// Drives a [`RunConfig`] end to end.
pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    factory: &'a dyn ModelFactory,
    images: Arc<dyn ImageLoader>,
    stop: StopSignal,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a RunConfig, factory: &'a dyn ModelFactory, images: Arc<dyn ImageLoader>) -> Self {
        Self { config, factory, images, stop: StopSignal::new() }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for requesting a stop at the next epoch boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Compose the configured sources, then run.
    pub fn run(&self, sink: &mut dyn MetricsSink) -> Result<RunOutcome> {
        let dataset = prepare_dataset(self.config)?;
        self.run_on(&dataset, sink)
    }

    /// Run every phase over an already remapped dataset.
    pub fn run_on(&self, dataset: &RemappedDataset, sink: &mut dyn MetricsSink) -> Result<RunOutcome> {
        let run = &self.config.run;
        let phases = &self.config.phases;
        for phase in phases {
            validate_phase(phase)?;
        }
        if phases.is_empty() {
            return Err(ConfigError::invalid("phases", "at least one phase is required").into());
        }
        for split in [Split::Train, Split::Val] {
            if dataset.split(split).is_empty() {
                return Err(Error::data(split, "composed dataset", "split is empty"));
            }
        }
        preflight(phases, dataset)?;

        let mut model = self
            .factory
            .create_model(run.model_name(), dataset.num_classes(), &run.device)
            .map_err(|e| Error::Model { phase: 0, message: e.message })?;
        let loader = BatchLoader::new(
            Arc::clone(&self.images),
            LoaderOptions {
                batch_size: run.batch_size,
                num_workers: run.num_workers,
                prefetch_depth: run.prefetch_depth,
            },
        )?;
        let data = PhaseData::from_dataset(dataset);

        let mut reports = Vec::with_capacity(phases.len());
        let mut stage = RunStage::Ready { next: 0 };
        while let RunStage::Ready { next } = stage {
            let report = PhaseRunner::new(next, &phases[next], &data, &loader, run.seed)
                .with_stop_signal(self.stop.clone())
                .run(model.as_mut(), sink)?;
            if let PhaseStatus::Diverged { message, .. } = &report.status {
                tracing::error!(phase = %report.name, %message, "phase diverged; continuing with the next phase");
            }
            stage = stage.after(&report.status, phases.len());
            reports.push(report);
        }

        let interrupted = matches!(stage, RunStage::Interrupted { .. });
        let test = if interrupted || dataset.test.is_empty() {
            None
        } else {
            let metrics = evaluate(
                model.as_mut(),
                &loader,
                dataset.test.clone().into(),
                Split::Test,
                &CrossEntropy::default(),
                dataset.num_classes(),
            )
            .map_err(|e| Error::Model { phase: phases.len().saturating_sub(1), message: e.message })?;
            for (name, value) in metrics.named() {
                sink.record("test", 0, &format!("test_{name}"), value);
            }
            tracing::info!(acc = metrics.accuracy, acc_macro = metrics.acc_macro, "test evaluation");
            Some(metrics)
        };

        if loader.skipped() > 0 {
            tracing::warn!(skipped = loader.skipped(), "examples skipped by the image loader during the run");
        }

        let report = RunReport {
            class_names: dataset.class_names().to_vec(),
            train_class_counts: dataset.class_counts(Split::Train),
            phases: reports,
            test,
            interrupted,
        };
        Ok(RunOutcome { model, report })
    }
}

/// Settings that only become checkable once class counts are known.
fn preflight(phases: &[PhaseConfig], dataset: &RemappedDataset) -> Result<()> {
    let counts = dataset.class_counts(Split::Train);
    for phase in phases {
        if phase.weighted_random_sampler.enabled {
            class_weights(&counts, &phase.weighted_random_sampler)?;
        }
        CriterionSchedule::from_phase(phase, &counts)?;
    }
    Ok(())
}
