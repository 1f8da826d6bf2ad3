//! Verificador CLI Library
//!
//! Command-line interface for the Verificar visual regression engine.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{CheckArgs, Cli, ColorArg, Commands, ConfigArgs, DiffArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Printer;
