//! Plan command: print the fully resolved configuration

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::logging::{log, LogLevel};
use crate::config::{load_config, RunConfig};

/// Serialize the resolved configuration.
pub fn render_plan(config: &RunConfig, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(config).map_err(|e| format!("Serialization error: {e}")),
        OutputFormat::Json => serde_json::to_string_pretty(config).map_err(|e| format!("Serialization error: {e}")),
    }
}

pub fn run_plan(args: &PlanArgs, level: LogLevel) -> Result<(), String> {
    let config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let rendered = render_plan(&config, args.format)?;
    log(level, LogLevel::Normal, rendered.trim_end());
    Ok(())
}
