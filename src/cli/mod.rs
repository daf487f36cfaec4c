//! Command-line interface: `validate`, `plan` and `inspect`.

mod args;
mod commands;
mod logging;

pub use args::{Cli, Command, InspectArgs, OutputFormat, PlanArgs, ValidateArgs};
pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};
