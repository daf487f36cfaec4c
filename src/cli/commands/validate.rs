//! Validate command implementation

use crate::cli::args::ValidateArgs;
use crate::cli::logging::{log, LogLevel};
use crate::config::{load_config, PhaseConfig, RunConfig};

/// One indented block describing a resolved phase.
pub fn format_phase(index: usize, phase: &PhaseConfig) -> String {
    let training = &phase.training;
    let mut lines = vec![
        format!("  Phase {index}: {}", phase.name),
        format!(
            "    Epochs: {} (patience {}, monitor {})",
            training.num_epochs,
            training.patience,
            training.monitor.as_str()
        ),
        format!("    Optimizer: {} lr={}", phase.optimizer.kind, phase.optimizer.lr),
        format!("    Scheduler: {}", phase.scheduler.kind),
    ];
    match &phase.criterion_b {
        Some(b) => lines.push(format!(
            "    Criterion: {} -> {} at epoch {}",
            phase.criterion_a, b, phase.first_stage_epochs
        )),
        None => lines.push(format!("    Criterion: {}", phase.criterion_a)),
    }
    if training.train_ratio < 1.0 {
        lines.push(format!("    Train ratio: {}", training.train_ratio));
    }
    if training.freeze_backbone {
        lines.push("    Backbone: frozen".to_string());
    }
    let sampler = &phase.weighted_random_sampler;
    if sampler.enabled {
        lines.push(format!(
            "    Sampler: weighted ({:?}, replacement={}, clamp=[{}, {}])",
            sampler.weight_calculation, sampler.replacement, sampler.min_weight, sampler.max_weight
        ));
    }
    let reg = &phase.regularization;
    if reg.max_norm.enabled {
        lines.push(format!(
            "    Max-norm: bound={} (L{})",
            reg.max_norm.thresh * reg.max_norm.tau,
            reg.max_norm.lp_norm
        ));
    }
    if reg.tau_normalization.enabled {
        lines.push(format!(
            "    Tau-normalization: tau={} every {} epoch(s)",
            reg.tau_normalization.tau, reg.tau_normalization.apply_frequency
        ));
    }
    lines.join("\n")
}

/// Run-level summary followed by every phase.
pub fn format_summary(config: &RunConfig) -> String {
    let run = &config.run;
    let mut lines = vec![
        format!("  Sources: {}", run.dataset.sources.len()),
        format!("  Model: {}", run.model_name()),
        format!("  Batch size: {} ({} workers)", run.batch_size, run.num_workers),
        format!("  Seed: {}", run.seed),
    ];
    if run.class_remapping.enabled {
        lines.push(format!("  Class remapping: {} entries", run.class_remapping.mapping.len()));
    }
    for (idx, phase) in config.phases.iter().enumerate() {
        lines.push(format_phase(idx, phase));
    }
    lines.join("\n")
}

pub fn run_validate(args: &ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Validating config: {}", args.config.display()));

    let config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!("Configuration is valid ({} phase(s))", config.phases.len()),
    );
    if args.detailed || level == LogLevel::Verbose {
        log(level, LogLevel::Normal, &format!("\nConfiguration Summary:\n{}", format_summary(&config)));
    }
    Ok(())
}
