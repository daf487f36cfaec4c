//! Error types with actionable diagnostics.
//!
//! Configuration problems are fatal and surface before any training starts.
//! Data integrity problems are fatal for the affected split. Divergence is
//! phase-local: the orchestrator records it and moves on to the next phase.

use crate::data::Split;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fases operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed or inconsistent configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read config file {path}\n  Cause: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file has invalid syntax or shape.
    #[error("Invalid configuration syntax in {path}:\n  {message}\n  → Check YAML syntax at the indicated line")]
    Parse { path: PathBuf, message: String },

    /// A `type`-style identifier is not recognised.
    #[error("Unknown {field} '{value}'\n  → Supported values: {allowed}")]
    UnknownType { field: String, value: String, allowed: String },

    /// A value is out of range or inconsistent with another value.
    #[error("Invalid configuration value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Build an `Invalid` error for `field`.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { field: field.into(), message: message.into() }
    }

    /// Build an `UnknownType` error listing the accepted identifiers.
    pub fn unknown(field: impl Into<String>, value: impl Into<String>, allowed: &[&str]) -> Self {
        Self::UnknownType { field: field.into(), value: value.into(), allowed: allowed.join(", ") }
    }
}

/// Errors raised by dataset composition, configuration and training.
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal configuration error, raised before training.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Missing file, empty split or unreadable annotation line.
    #[error("Data integrity error in {split} split ({origin}): {message}")]
    DataIntegrity { split: Split, origin: String, message: String },

    /// Non-finite loss during a phase.
    #[error("Training diverged in phase {phase} at epoch {epoch}, batch {batch}: loss = {loss}\n  → Lower the learning rate or enable clip_grad_norm")]
    TrainingDivergence { phase: usize, epoch: usize, batch: usize, loss: f32 },

    /// The model collaborator failed on forward or backward.
    #[error("Model error in phase {phase}: {message}")]
    Model { phase: usize, message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a data integrity error for `split`.
    pub fn data(split: Split, origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataIntegrity { split, origin: origin.into(), message: message.into() }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Whether the error only invalidates the current phase.
    pub fn is_phase_local(&self) -> bool {
        matches!(self, Self::TrainingDivergence { .. })
    }
}
