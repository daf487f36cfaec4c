//! Multi-phase training
//!
//! - [`criterion`] - losses and the two-stage [`CriterionSchedule`]
//! - [`regularization`] - max-norm projection and tau-normalization
//! - [`plateau`] - LR reduction on plateau and early stopping
//! - [`metrics`] - confusion-matrix classification metrics
//! - [`sink`] - metric records and best-checkpoint events
//! - [`phase`] - one phase's epoch loop
//! - [`orchestrator`] - runs the resolved phases in order
//!
//! # Example
//!
//! ```no_run
//! use fases::config::load_config;
//! use fases::train::{MetricHistory, Orchestrator};
//! # use fases::model::{ImageLoader, ModelFactory};
//! # fn demo(factory: &dyn ModelFactory, images: std::sync::Arc<dyn ImageLoader>) -> fases::Result<()> {
//! let config = load_config("experiment.yaml")?;
//! let mut history = MetricHistory::new();
//! let outcome = Orchestrator::new(&config, factory, images).run(&mut history)?;
//! println!("{}", outcome.report.to_json().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod criterion;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod plateau;
pub mod regularization;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use criterion::{
    build_criterion, ClassBalancedLoss, Criterion, CriterionSchedule, CrossEntropy, FocalLoss, LossOutput, Stage,
    CRITERION_TYPES,
};
pub use metrics::{ConfusionMatrix, EpochMetrics, MetricAccumulator};
pub use orchestrator::{prepare_dataset, Orchestrator, RunOutcome, RunReport};
pub use phase::{EpochSummary, PhaseData, PhaseReport, PhaseRunner, PhaseStatus, StopSignal, TrainingState};
pub use plateau::{PlateauController, PlateauDecision};
pub use regularization::{RegularizationPolicy, RegularizationReport};
pub use sink::{MetricHistory, MetricRecord, MetricsSink, TracingSink};
