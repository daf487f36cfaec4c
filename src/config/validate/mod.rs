//! Configuration validation
//!
//! Validates resolved run configurations for correctness before execution.

mod validator;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod tests;

pub use validator::{validate_config, validate_phase};
