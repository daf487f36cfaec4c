//! Fases: multi-phase image-classification training orchestration
//!
//! Turns a declarative YAML run description into training behaviour:
//!
//! - [`data`] - compose annotation-list and folder sources, remap classes,
//!   derive imbalance-correcting sample weights and stream batches
//! - [`config`] - schema, per-phase inheritance by deep merge, validation
//! - [`optim`] - optimizers, gradient clipping and learning-rate schedules
//! - [`train`] - criterion switching, weight-norm regularization, plateau
//!   control and the phase orchestrator
//! - [`model`] - contracts for the network and image-loading collaborators
//!
//! Network architectures and pixel pipelines are supplied by the caller
//! through [`model::ModelFactory`] and [`model::ImageLoader`].

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod optim;
pub mod train;

pub use error::{ConfigError, Error, Result};
