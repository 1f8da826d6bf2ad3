//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod check;
pub mod config;
pub mod diff;

use crate::error::CliResult;
use std::path::Path;
use verificar::VerificarConfig;

// Re-export handlers for convenient access
pub use check::execute_check;
pub use config::{effective_config, execute_config};
pub use diff::{execute_diff, run_diff};

/// Configuration from `path`, or the built-in defaults
pub fn load_base_config(path: Option<&Path>) -> CliResult<VerificarConfig> {
    match path {
        Some(path) => Ok(VerificarConfig::load(path)?),
        None => Ok(VerificarConfig::default()),
    }
}
