//! Inspect command: composed dataset statistics and sampler weights

use crate::cli::args::InspectArgs;
use crate::cli::logging::{log, LogLevel};
use crate::config::{load_config, SamplerSpec};
use crate::data::{class_weights, RemappedDataset, Split};
use crate::train::prepare_dataset;

/// Per-split sizes and per-class counts.
pub fn format_distribution(dataset: &RemappedDataset) -> String {
    let mut lines = vec![format!(
        "  Examples: train={} val={} test={}",
        dataset.train.len(),
        dataset.val.len(),
        dataset.test.len()
    )];
    let counts: Vec<Vec<usize>> = Split::ALL.iter().map(|&s| dataset.class_counts(s)).collect();
    lines.push(format!("  {:<24} {:>8} {:>8} {:>8}", "class", "train", "val", "test"));
    for (idx, name) in dataset.class_names().iter().enumerate() {
        lines.push(format!(
            "  {:<24} {:>8} {:>8} {:>8}",
            format!("{idx}: {name}"),
            counts[0][idx],
            counts[1][idx],
            counts[2][idx]
        ));
    }
    lines.join("\n")
}

/// Range of per-class sampling weights under `spec`.
pub fn format_weights(phase: &str, train_counts: &[usize], spec: &SamplerSpec) -> Result<String, String> {
    if !spec.enabled {
        return Ok(format!("  {phase}: uniform shuffling"));
    }
    let weights = class_weights(train_counts, spec).map_err(|e| format!("Config error: {e}"))?;
    let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(format!(
        "  {phase}: {:?} weights in [{min:.4}, {max:.4}], replacement={}",
        spec.weight_calculation, spec.replacement
    ))
}

pub fn run_inspect(args: &InspectArgs, level: LogLevel) -> Result<(), String> {
    let config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let dataset = prepare_dataset(&config).map_err(|e| format!("Data error: {e}"))?;

    log(level, LogLevel::Normal, &format!("Dataset ({} classes):", dataset.num_classes()));
    log(level, LogLevel::Normal, &format_distribution(&dataset));

    let train_counts = dataset.class_counts(Split::Train);
    log(level, LogLevel::Normal, "Sampling:");
    for phase in &config.phases {
        let line = format_weights(&phase.name, &train_counts, &phase.weighted_random_sampler)?;
        log(level, LogLevel::Normal, &line);
    }
    Ok(())
}
