//! Declarative YAML configuration
//!
//! A configuration file declares run-wide settings plus phase blocks. Loading
//! resolves the blocks into one [`PhaseConfig`] per phase by deep merge and
//! validates the result before any data is touched.

mod loader;
pub mod merge;
pub mod schema;
mod validate;

pub use loader::{load_config, parse_config, RunConfig};
pub use schema::{
    ClassRemapping, CriterionParams, DatasetSpec, DeviceSpec, MaxNormSpec, Monitor, OptimizerSpec, PhaseConfig,
    PlateauMode, RegularizationScope, RegularizationSpec, RunSpec, SamplerSpec, SchedulerSpec, TauNormSpec,
    ThresholdMode, TrainingParams, WeightCalculation,
};
pub use validate::{validate_config, validate_phase};
