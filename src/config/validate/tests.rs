//! Unit tests for configuration validation

use super::validator::validate_config;
use crate::config::loader::RunConfig;
use crate::config::schema::*;
use crate::data::{AnnotationSource, DatasetSource};
use crate::error::ConfigError;
use std::path::PathBuf;

fn create_valid_config() -> RunConfig {
    let source = DatasetSource::Annotation(AnnotationSource {
        root: PathBuf::from("images"),
        train: Some(PathBuf::from("train.txt")),
        val: Some(PathBuf::from("val.txt")),
        test: None,
        train_root: None,
        val_root: None,
        test_root: None,
    });
    RunConfig {
        run: RunSpec { dataset: DatasetSpec { sources: vec![source] }, ..Default::default() },
        phases: vec![PhaseConfig::default()],
    }
}

fn field_of(err: ConfigError) -> String {
    match err {
        ConfigError::Invalid { field, .. } | ConfigError::UnknownType { field, .. } => field,
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_valid_config() {
    assert!(validate_config(&create_valid_config()).is_ok());
}

#[test]
fn test_no_sources() {
    let mut config = create_valid_config();
    config.run.dataset.sources.clear();
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "dataset.sources");
}

#[test]
fn test_invalid_batch_size() {
    let mut config = create_valid_config();
    config.run.batch_size = 0;
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "batch_size");
}

#[test]
fn test_invalid_learning_rate() {
    let mut config = create_valid_config();
    config.phases[0].optimizer.lr = 0.0;
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "main.optimizer.lr");

    config.phases[0].optimizer.lr = f32::NAN;
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_unknown_optimizer_type() {
    let mut config = create_valid_config();
    config.phases[0].optimizer.kind = "lbfgs".to_string();
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownType { ref value, .. } if value == "lbfgs"));
}

#[test]
fn test_unknown_scheduler_type() {
    let mut config = create_valid_config();
    config.phases[0].scheduler.kind = "onecycle".to_string();
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "main.scheduler.type");
}

#[test]
fn test_unknown_criterion_fails_before_training() {
    let mut config = create_valid_config();
    config.phases[0].criterion_b = Some("hinge".to_string());
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "main.criterion_b");
}

#[test]
fn test_scheduler_mode_must_match_monitor() {
    let mut config = create_valid_config();
    config.phases[0].training.monitor = Monitor::ValLoss;
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "main.scheduler.mode");

    config.phases[0].scheduler.mode = PlateauMode::Min;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_train_ratio_bounds() {
    let mut config = create_valid_config();
    config.phases[0].training.train_ratio = 0.0;
    assert!(validate_config(&config).is_err());
    config.phases[0].training.train_ratio = 1.5;
    assert!(validate_config(&config).is_err());
    config.phases[0].training.train_ratio = 0.25;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_custom_weights_required() {
    let mut config = create_valid_config();
    config.phases[0].weighted_random_sampler.weight_calculation = WeightCalculation::Custom;
    assert!(validate_config(&config).is_err());
    config.phases[0].weighted_random_sampler.custom_weights = Some(vec![1.0, 2.0]);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_sampler_bounds_ordered() {
    let mut config = create_valid_config();
    config.phases[0].weighted_random_sampler.min_weight = 5.0;
    config.phases[0].weighted_random_sampler.max_weight = 1.0;
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "main.weighted_random_sampler");
}

#[test]
fn test_tau_frequency_zero() {
    let mut config = create_valid_config();
    config.phases[0].regularization.tau_normalization.enabled = true;
    config.phases[0].regularization.tau_normalization.apply_frequency = 0;
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_error_names_the_failing_phase() {
    let mut config = create_valid_config();
    let mut second = PhaseConfig { name: "classifier_only".to_string(), ..PhaseConfig::default() };
    second.training.num_epochs = 0;
    config.phases.push(second);
    assert_eq!(field_of(validate_config(&config).unwrap_err()), "classifier_only.training.num_epochs");
}
