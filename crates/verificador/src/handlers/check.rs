//! Check command handler
//!
//! Opens the viewer in Chromium and walks every configured series. Only
//! available when built with the `browser` feature.

use super::load_base_config;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::CheckArgs;
use verificar::{FailureMode, VerificarConfig};

/// Base configuration with `--url` applied
pub fn check_config(args: &CheckArgs) -> CliResult<VerificarConfig> {
    let mut config = load_base_config(args.config.as_deref())?;
    if let Some(ref url) = args.url {
        config = config.with_base_url(url);
    }
    if config.base_url.is_none() {
        return Err(CliError::invalid_argument(
            "no page to check: pass --url or set base_url in the config file",
        ));
    }
    Ok(config)
}

/// Failure mode selected by `--collect-all`
#[must_use]
pub const fn failure_mode(args: &CheckArgs) -> FailureMode {
    if args.collect_all {
        FailureMode::CollectAll
    } else {
        FailureMode::FailFast
    }
}

/// Execute the check command
#[cfg(feature = "browser")]
pub async fn execute_check(config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    use crate::output::Printer;
    use tracing::info;
    use verificar::{
        BrowserOptions, ChromiumSurfaceDriver, LocalFileStore, PixelDiffComparator, SeriesRunner,
        SurfaceDriver, ViewerNavigator,
    };

    let settings = check_config(args)?;
    let url = settings.base_url.clone().unwrap_or_default();

    let mut options = BrowserOptions::default().with_headless(!args.headed);
    if args.no_sandbox {
        options = options.with_no_sandbox();
    }

    let driver = ChromiumSurfaceDriver::launch(&options, settings.fetch_timeout()).await?;
    driver.goto(&url).await?;
    driver
        .wait_for_network_idle(settings.stability.network_idle_timeout())
        .await?;
    info!(%url, series = settings.series.len(), "viewer loaded");

    let comparator = PixelDiffComparator::new(
        driver,
        LocalFileStore::new(),
        settings.to_comparator_config(),
    );
    let report = {
        let navigator = ViewerNavigator::new(
            comparator.driver(),
            settings.navigation.clone(),
            settings.surface.handle(),
        )
        .with_stability(&settings.stability);
        SeriesRunner::new(&comparator, &navigator, settings.surface.handle())
            .with_failure_mode(failure_mode(args))
            .run(&settings.series)
            .await
    };
    comparator.into_driver().close().await?;

    if let Some(ref path) = args.report {
        report.write_json(path)?;
        info!(path = %path.display(), "report written");
    }

    let printer = Printer::new(config.color.should_color(), config.verbosity.is_quiet(), config.json);
    let text = printer
        .render_report(&report)
        .map_err(|e| CliError::config(e.to_string()))?;
    printer.emit(&text);

    if report.all_passed() {
        Ok(())
    } else {
        Err(CliError::verification_failed(report.summary()))
    }
}

/// Execute the check command
#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
pub async fn execute_check(_config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    check_config(args)?;
    Err(CliError::config(
        "the check command needs verificador built with the `browser` feature",
    ))
}
