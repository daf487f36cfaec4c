//! CLI command implementations

mod inspect;
mod plan;
mod validate;

use super::args::{Cli, Command};
use super::logging::LogLevel;

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let level = LogLevel::from_flags(cli.quiet, cli.verbose);
    match cli.command {
        Command::Validate(args) => validate::run_validate(&args, level),
        Command::Plan(args) => plan::run_plan(&args, level),
        Command::Inspect(args) => inspect::run_inspect(&args, level),
    }
}
