//! Config command handler

use super::load_base_config;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::ConfigArgs;
use verificar::VerificarConfig;

/// Configuration the other commands would use for `args`
pub fn effective_config(args: &ConfigArgs) -> CliResult<VerificarConfig> {
    if args.default {
        return Ok(VerificarConfig::default());
    }
    load_base_config(args.file.as_deref())
}

/// Execute the config command
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let effective = effective_config(args)?;
    let text = if config.json {
        serde_json::to_string_pretty(&effective).map_err(|e| CliError::config(e.to_string()))?
    } else {
        effective.to_yaml()?
    };
    println!("{}", text.trim_end());
    Ok(())
}
