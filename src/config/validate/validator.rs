//! Configuration validation logic
//!
//! Validates a resolved run configuration before any data is read.

use crate::config::loader::RunConfig;
use crate::config::schema::{PhaseConfig, PlateauMode, WeightCalculation};
use crate::error::ConfigError;
use crate::optim::{OPTIMIZER_TYPES, SCHEDULER_TYPES};
use crate::train::CRITERION_TYPES;

/// Validate a run configuration
///
/// Checks:
/// - Required collections are non-empty
/// - Numeric values are in valid ranges
/// - `type` identifiers name a known optimizer, scheduler or criterion
/// - Scheduler mode agrees with the monitored metric
pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    let run = &config.run;

    if run.dataset.sources.is_empty() {
        return Err(ConfigError::invalid("dataset.sources", "at least one source is required"));
    }
    if run.batch_size == 0 {
        return Err(ConfigError::invalid("batch_size", "must be > 0"));
    }
    if run.prefetch_depth == 0 {
        return Err(ConfigError::invalid("prefetch_depth", "must be > 0"));
    }
    if run.model_names.is_empty() {
        return Err(ConfigError::invalid("model_names", "at least one model name is required"));
    }
    if let Some(names) = &run.class_names {
        if names.is_empty() {
            return Err(ConfigError::invalid("class_names", "must not be empty when given"));
        }
    }
    if let Some(names) = &run.class_remapping.final_class_names {
        if run.class_remapping.enabled && names.is_empty() {
            return Err(ConfigError::invalid(
                "class_remapping.final_class_names",
                "must not be empty when given",
            ));
        }
    }

    if config.phases.is_empty() {
        return Err(ConfigError::invalid("phases", "at least one phase is required"));
    }
    for phase in &config.phases {
        validate_phase(phase)?;
    }
    Ok(())
}

fn field(phase: &PhaseConfig, key: &str) -> String {
    format!("{}.{key}", phase.name)
}

/// Validate one resolved phase.
pub fn validate_phase(phase: &PhaseConfig) -> Result<(), ConfigError> {
    let training = &phase.training;
    if training.num_epochs == 0 {
        return Err(ConfigError::invalid(field(phase, "training.num_epochs"), "must be > 0"));
    }
    if !(training.train_ratio > 0.0 && training.train_ratio <= 1.0) {
        return Err(ConfigError::invalid(
            field(phase, "training.train_ratio"),
            format!("{} is outside (0, 1]", training.train_ratio),
        ));
    }

    // Optimizer
    let opt = &phase.optimizer;
    if !OPTIMIZER_TYPES.contains(&opt.kind.as_str()) {
        return Err(ConfigError::unknown(field(phase, "optimizer.type"), &opt.kind, OPTIMIZER_TYPES));
    }
    if !(opt.lr > 0.0 && opt.lr.is_finite()) {
        return Err(ConfigError::invalid(field(phase, "optimizer.lr"), format!("{} must be > 0", opt.lr)));
    }
    if !(0.0..1.0).contains(&opt.momentum) {
        return Err(ConfigError::invalid(field(phase, "optimizer.momentum"), "must be in [0, 1)"));
    }
    if !(0.0..1.0).contains(&opt.betas.0) || !(0.0..1.0).contains(&opt.betas.1) {
        return Err(ConfigError::invalid(field(phase, "optimizer.betas"), "both betas must be in [0, 1)"));
    }
    if opt.eps <= 0.0 {
        return Err(ConfigError::invalid(field(phase, "optimizer.eps"), "must be > 0"));
    }
    if opt.effective_weight_decay() < 0.0 {
        return Err(ConfigError::invalid(field(phase, "optimizer.weight_decay"), "must be >= 0"));
    }

    // Scheduler
    let sched = &phase.scheduler;
    if !SCHEDULER_TYPES.contains(&sched.kind.as_str()) {
        return Err(ConfigError::unknown(field(phase, "scheduler.type"), &sched.kind, SCHEDULER_TYPES));
    }
    if !(sched.factor > 0.0 && sched.factor < 1.0) {
        return Err(ConfigError::invalid(field(phase, "scheduler.factor"), "must be in (0, 1)"));
    }
    if sched.threshold < 0.0 || sched.min_lr < 0.0 || sched.eta_min < 0.0 {
        return Err(ConfigError::invalid(
            field(phase, "scheduler"),
            "threshold, min_lr and eta_min must be >= 0",
        ));
    }
    if sched.kind == "step" && sched.step_size == 0 {
        return Err(ConfigError::invalid(field(phase, "scheduler.step_size"), "must be > 0"));
    }
    if sched.kind == "step" && !(sched.gamma > 0.0 && sched.gamma <= 1.0) {
        return Err(ConfigError::invalid(field(phase, "scheduler.gamma"), "must be in (0, 1]"));
    }
    if sched.t_max == Some(0) {
        return Err(ConfigError::invalid(field(phase, "scheduler.t_max"), "must be > 0"));
    }
    let expected = training.monitor.mode();
    if sched.mode != expected {
        let want = if expected == PlateauMode::Min { "min" } else { "max" };
        return Err(ConfigError::invalid(
            field(phase, "scheduler.mode"),
            format!("monitor '{}' improves in mode '{want}'", training.monitor.as_str()),
        ));
    }

    // Criteria
    for (key, id, params) in [
        ("criterion_a", Some(&phase.criterion_a), &phase.criterion_a_params),
        ("criterion_b", phase.criterion_b.as_ref(), &phase.criterion_b_params),
    ] {
        let Some(id) = id else { continue };
        if !CRITERION_TYPES.contains(&id.as_str()) {
            return Err(ConfigError::unknown(field(phase, key), id, CRITERION_TYPES));
        }
        if !(0.0..1.0).contains(&params.label_smoothing) {
            return Err(ConfigError::invalid(
                field(phase, &format!("{key}_params.label_smoothing")),
                "must be in [0, 1)",
            ));
        }
        if params.gamma.is_some_and(|g| g < 0.0) {
            return Err(ConfigError::invalid(field(phase, &format!("{key}_params.gamma")), "must be >= 0"));
        }
        if !(0.0..1.0).contains(&params.beta) {
            return Err(ConfigError::invalid(field(phase, &format!("{key}_params.beta")), "must be in [0, 1)"));
        }
    }
    if phase.criterion_b.is_none() && phase.first_stage_epochs > 0 {
        tracing::warn!(phase = %phase.name, "first_stage_epochs is set without criterion_b and has no effect");
    }

    // Sampler
    let sampler = &phase.weighted_random_sampler;
    if !(sampler.min_weight > 0.0) || sampler.max_weight < sampler.min_weight {
        return Err(ConfigError::invalid(
            field(phase, "weighted_random_sampler"),
            format!(
                "need 0 < min_weight <= max_weight, got [{}, {}]",
                sampler.min_weight, sampler.max_weight
            ),
        ));
    }
    if sampler.weight_calculation == WeightCalculation::Custom {
        match &sampler.custom_weights {
            None => {
                return Err(ConfigError::invalid(
                    field(phase, "weighted_random_sampler.custom_weights"),
                    "weight_calculation 'custom' requires custom_weights",
                ))
            }
            Some(weights) if weights.iter().any(|w| !(*w > 0.0 && w.is_finite())) => {
                return Err(ConfigError::invalid(
                    field(phase, "weighted_random_sampler.custom_weights"),
                    "every weight must be positive and finite",
                ))
            }
            Some(_) => {}
        }
    }

    // Regularization
    let reg = &phase.regularization;
    if reg.max_norm.enabled {
        if !(reg.max_norm.thresh > 0.0 && reg.max_norm.tau > 0.0) {
            return Err(ConfigError::invalid(field(phase, "regularization.max_norm"), "thresh and tau must be > 0"));
        }
        if reg.max_norm.lp_norm < 1.0 {
            return Err(ConfigError::invalid(field(phase, "regularization.max_norm.lp_norm"), "must be >= 1"));
        }
    }
    if reg.tau_normalization.enabled {
        if !(reg.tau_normalization.tau > 0.0) {
            return Err(ConfigError::invalid(field(phase, "regularization.tau_normalization.tau"), "must be > 0"));
        }
        if reg.tau_normalization.lp_norm < 1.0 {
            return Err(ConfigError::invalid(
                field(phase, "regularization.tau_normalization.lp_norm"),
                "must be >= 1",
            ));
        }
        if reg.tau_normalization.apply_frequency == 0 {
            return Err(ConfigError::invalid(
                field(phase, "regularization.tau_normalization.apply_frequency"),
                "must be > 0",
            ));
        }
    }
    Ok(())
}
