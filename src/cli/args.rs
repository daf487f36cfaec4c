//! CLI types - Cli, Command and argument structs

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fases: multi-phase image-classification training orchestration
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "fases")]
#[command(version)]
#[command(about = "Resolve, validate and inspect multi-phase classification training runs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load and validate a configuration file
    Validate(ValidateArgs),

    /// Print the resolved per-phase configuration
    Plan(PlanArgs),

    /// Compose the dataset and report class distribution and sampler weights
    Inspect(InspectArgs),
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show a per-phase summary
    #[arg(short, long)]
    pub detailed: bool,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PlanArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Serialization format for `plan`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["fases", "validate", "run.yaml", "--detailed"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Validate(ValidateArgs { config: PathBuf::from("run.yaml"), detailed: true })
        );
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_plan_json_with_global_flag() {
        let cli = Cli::try_parse_from(["fases", "plan", "run.yaml", "--format", "json", "-v"]).unwrap();
        assert!(cli.verbose);
        let Command::Plan(args) = cli.command else { panic!("expected plan") };
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_missing_config_is_rejected() {
        assert!(Cli::try_parse_from(["fases", "inspect"]).is_err());
    }
}
