//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the level derived from `-q`/`-v`. Logs go to stderr so
//! stdout stays clean for `--json`.

use crate::config::CliConfig;
use tracing_subscriber::EnvFilter;

/// Filter for `config`, honouring `RUST_LOG` when set
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()))
}

/// Install the global subscriber; later calls are ignored
pub fn init(config: &CliConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(config.verbosity.is_debug());

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.color.should_color()).try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
