//! Verificador: pixel-exact visual regression checks from the command line
//!
//! ## Usage
//!
//! ```bash
//! verificador diff capture.jpg --fixture-dir fixture/series1 --prefix series_1 --index 3
//! verificador config --default              # Print built-in configuration
//! verificador check --url http://localhost:3000 --collect-all
//! ```

use clap::Parser;
use std::future::Future;
use std::process::ExitCode;
use verificador::{
    handlers::{execute_check, execute_config, execute_diff},
    logging, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    // Build configuration from CLI args
    let config = build_config(&cli);
    logging::init(&config);

    match cli.command {
        Commands::Diff(args) => block_on(execute_diff(&config, &args)),
        Commands::Config(args) => execute_config(&config, &args),
        Commands::Check(args) => block_on(execute_check(&config, &args)),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(ColorChoice::from(cli.color))
        .with_json(cli.json)
}

fn block_on<F: Future<Output = CliResult<()>>>(future: F) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime(format!("Failed to create tokio runtime: {e}")))?;
    rt.block_on(future)
}
