//! Diff command handler
//!
//! Compares a capture already on disk against its fixture. No browser is
//! involved; the comparator runs from fixture resolution onward.

use super::load_base_config;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Printer;
use crate::DiffArgs;
use tokio::time::Instant;
use tracing::info;
use verificar::{
    ComparisonIdentity, LocalFileStore, PixelDiffComparator, VerdictRecord, VerificarConfig,
};

/// Base configuration with the command-line overrides applied
pub fn diff_config(args: &DiffArgs) -> CliResult<VerificarConfig> {
    let mut config = load_base_config(args.config.as_deref())?;
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(ref dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }
    Ok(config)
}

/// Run the comparison and summarize it
pub async fn run_diff(args: &DiffArgs) -> CliResult<VerdictRecord> {
    let config = diff_config(args)?;
    let identity = ComparisonIdentity::new(&args.prefix, args.index, &args.fixture_dir)?;
    let rendered = tokio::fs::read(&args.rendered).await.map_err(|e| {
        CliError::invalid_argument(format!(
            "cannot read rendered image {}: {e}",
            args.rendered.display()
        ))
    })?;

    let comparator =
        PixelDiffComparator::offline(LocalFileStore::new(), config.to_comparator_config());
    let start = Instant::now();
    let verdict = comparator.compare_capture(rendered, &identity).await;
    let record = VerdictRecord::from_verdict(&verdict, start.elapsed());
    info!(identity = %record.identity, passed = record.passed, "diff complete");
    Ok(record)
}

/// Execute the diff command; a failed comparison is an error
pub async fn execute_diff(config: &CliConfig, args: &DiffArgs) -> CliResult<()> {
    let record = run_diff(args).await?;
    let printer = Printer::new(config.color.should_color(), config.verbosity.is_quiet(), config.json);
    let text = printer
        .render_record(&record)
        .map_err(|e| CliError::config(e.to_string()))?;
    printer.emit(&text);

    if record.passed {
        Ok(())
    } else {
        let reason = record
            .message
            .unwrap_or_else(|| format!("{} did not match its fixture", record.identity));
        Err(CliError::verification_failed(reason))
    }
}
