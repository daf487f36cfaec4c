//! Fases CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate config
//! fases validate run.yaml --detailed
//!
//! # Print the resolved phases
//! fases plan run.yaml --format json
//!
//! # Class distribution and sampler weights
//! fases inspect run.yaml
//! ```

use clap::Parser;
use fases::cli::{init_tracing, run_command, Cli, LogLevel};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogLevel::from_flags(cli.quiet, cli.verbose));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
