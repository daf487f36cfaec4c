//! Loading: read → parse → resolve phases → validate.

use super::merge::resolve_phases;
use super::schema::{PhaseConfig, RunSpec, PHASE_KEYS};
use super::validate::validate_config;
use crate::error::ConfigError;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level keys that are neither run-wide settings nor phase blocks.
const PHASE_LIST_KEYS: &[&str] = &["classifier_only_training", "phases"];

const RUN_KEYS: &[&str] = &[
    "dataset",
    "batch_size",
    "num_workers",
    "prefetch_depth",
    "seed",
    "class_names",
    "class_remapping",
    "model_names",
    "augmentation",
    "results_dir",
    "device",
];

/// A loaded, resolved and validated configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub run: RunSpec,
    pub phases: Vec<PhaseConfig>,
}

/// Parse and resolve a configuration document without validating it.
///
/// `path` is used for error messages only.
pub fn parse_config(content: &str, path: &Path) -> Result<RunConfig, ConfigError> {
    let doc: Value = serde_yaml::from_str(content)
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })?;
    let root = match doc {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map,
        _ => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: "top level must be a mapping".to_string(),
            })
        }
    };

    for key in root.keys() {
        let name = key.as_str().unwrap_or_default();
        if !RUN_KEYS.contains(&name) && !PHASE_KEYS.contains(&name) && !PHASE_LIST_KEYS.contains(&name) {
            tracing::warn!(key = ?key, "ignoring unknown top-level configuration key");
        }
    }

    let run: RunSpec = serde_yaml::from_value(Value::Mapping(run_section(&root)))
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })?;
    let phases = resolve_phases(&root, path)?;
    Ok(RunConfig { run, phases })
}

fn run_section(root: &Mapping) -> Mapping {
    root.iter()
        .filter(|(key, value)| key.as_str().is_some_and(|k| RUN_KEYS.contains(&k)) && !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Load, resolve and validate the configuration at `path`.
///
/// Relative dataset paths and `results_dir` are resolved against the
/// directory containing the file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    let mut config = parse_config(&content, path)?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    for source in &mut config.run.dataset.sources {
        source.resolve_relative(&base);
    }
    if config.run.results_dir.is_relative() {
        config.run.results_dir = base.join(&config.run.results_dir);
    }

    validate_config(&config)?;
    tracing::info!(
        path = %path.display(),
        phases = ?config.phases.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        sources = config.run.dataset.sources.len(),
        "loaded configuration"
    );
    Ok(config)
}
