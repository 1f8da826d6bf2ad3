//! Series sequencing.
//!
//! Verifies every image of every configured series in order. Moving between
//! images is the job of a [`SeriesNavigator`]; this module only decides when
//! to navigate and records what each comparison found.
//!
//! For each series: enter it (every series after the first), then compare
//! image `1..=total_images`, advancing after each image except the last.
//!
//! [`ViewerNavigator`] is the navigator for pages driven through
//! [`ViewerControls`]: it clicks a control, then waits for the surface to
//! show something new before the fixed pause.

use crate::comparator::PixelDiffComparator;
use crate::config::{NavigationConfig, SeriesConfig};
use crate::driver::{SurfaceDriver, ViewerControls};
use crate::file_ops::FileStore;
use crate::locator::SurfaceHandle;
use crate::reporter::{FailureMode, RunReport, SeriesReport, VerdictRecord};
use crate::result::{VerificarError, VerificarResult};
use crate::wait::StabilityOptions;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Button attribute reporting the selected series
const PRESSED_ATTRIBUTE: &str = "aria-pressed";

/// Moves the surface between images and series
#[async_trait]
pub trait SeriesNavigator: Send + Sync {
    /// Show the first image of `series` (`number` is its 1-based position)
    async fn switch_to(&self, series: &SeriesConfig, number: usize) -> VerificarResult<()>;

    /// Show the next image of the current series
    async fn next_image(&self) -> VerificarResult<()>;
}

/// Clicks the viewer's next and series buttons
///
/// Every click is followed by a wait for the surface to change (the content
/// attribute after "next", [`NavigationConfig::series_change_attribute`] after
/// a series switch), bounded by the stability wait budget. The configured
/// pause runs only after the change has landed.
#[derive(Debug)]
pub struct ViewerNavigator<'a, D: ?Sized> {
    driver: &'a D,
    navigation: NavigationConfig,
    surface: SurfaceHandle,
    change_budget_ms: u64,
    poll_interval: Duration,
}

impl<'a, D: ViewerControls + ?Sized> ViewerNavigator<'a, D> {
    /// Create a navigator for `surface` with default stability timing
    #[must_use]
    pub fn new(driver: &'a D, navigation: NavigationConfig, surface: SurfaceHandle) -> Self {
        let stability = StabilityOptions::default();
        Self {
            driver,
            navigation,
            surface,
            change_budget_ms: stability.max_wait_ms,
            poll_interval: stability.poll_interval(),
        }
    }

    /// Take the change budget and polling interval from `stability`
    #[must_use]
    pub fn with_stability(mut self, stability: &StabilityOptions) -> Self {
        self.change_budget_ms = stability.max_wait_ms;
        self.poll_interval = stability.poll_interval();
        self
    }

    fn timed_out(&self, operation: &str) -> VerificarError {
        VerificarError::Timeout {
            operation: operation.to_string(),
            ms: self.change_budget_ms,
        }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = VerificarResult<T>> + Send,
    ) -> VerificarResult<T> {
        tokio::time::timeout(Duration::from_millis(self.change_budget_ms), call)
            .await
            .map_err(|_| self.timed_out(operation))?
    }

    /// Poll `attribute` until it holds a value other than `before`
    async fn wait_for_change(
        &self,
        handle: &SurfaceHandle,
        attribute: &str,
        before: Option<&str>,
        operation: &str,
    ) -> VerificarResult<()> {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.change_budget_ms);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.driver.get_attribute(handle, attribute)).await
            {
                Ok(Ok(Some(current))) if Some(current.as_str()) != before => {
                    debug!(waited = ?start.elapsed(), %current, "{operation} landed");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(self.timed_out(operation)),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(operation));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl<D: ViewerControls + ?Sized> SeriesNavigator for ViewerNavigator<'_, D> {
    #[instrument(skip_all, fields(series = %series.name))]
    async fn switch_to(&self, series: &SeriesConfig, number: usize) -> VerificarResult<()> {
        let operation = "series switch";
        let button = SurfaceHandle::new(self.navigation.series_button(number));
        let pressed = self
            .bounded(operation, self.driver.get_attribute(&button, PRESSED_ATTRIBUTE))
            .await?;
        if pressed.as_deref() == Some("true") {
            debug!("series already selected");
            return Ok(());
        }

        let attribute = self.navigation.series_change_attribute.as_str();
        let before = self
            .bounded(operation, self.driver.get_attribute(&self.surface, attribute))
            .await?;
        self.bounded(operation, self.driver.click(&button.selector)).await?;
        self.wait_for_change(&self.surface, attribute, before.as_deref(), operation)
            .await?;

        let pressed = self
            .bounded(operation, self.driver.get_attribute(&button, PRESSED_ATTRIBUTE))
            .await?;
        if pressed.as_deref() != Some("true") {
            return Err(VerificarError::driver(format!(
                "{} reports {PRESSED_ATTRIBUTE}={} after the click",
                button.selector,
                pressed.as_deref().unwrap_or("(absent)")
            )));
        }

        tokio::time::sleep(self.navigation.after_series_switch()).await;
        Ok(())
    }

    async fn next_image(&self) -> VerificarResult<()> {
        let operation = "next image";
        let attribute = self.surface.content_attribute.as_str();
        let before = self
            .bounded(operation, self.driver.get_attribute(&self.surface, attribute))
            .await?;
        self.bounded(operation, self.driver.click(&self.navigation.next_button))
            .await?;
        self.wait_for_change(&self.surface, attribute, before.as_deref(), operation)
            .await?;
        tokio::time::sleep(self.navigation.after_next()).await;
        Ok(())
    }
}

/// Runs comparisons over whole series
#[derive(Debug)]
pub struct SeriesRunner<'a, D, F, N: ?Sized> {
    comparator: &'a PixelDiffComparator<D, F>,
    navigator: &'a N,
    handle: SurfaceHandle,
    failure_mode: FailureMode,
}

impl<'a, D, F, N> SeriesRunner<'a, D, F, N>
where
    D: SurfaceDriver,
    F: FileStore,
    N: SeriesNavigator + ?Sized,
{
    /// Create a fail-fast runner observing `handle`
    #[must_use]
    pub const fn new(
        comparator: &'a PixelDiffComparator<D, F>,
        navigator: &'a N,
        handle: SurfaceHandle,
    ) -> Self {
        Self {
            comparator,
            navigator,
            handle,
            failure_mode: FailureMode::FailFast,
        }
    }

    /// Set the failure mode
    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Verify every series in order
    pub async fn run(&self, series: &[SeriesConfig]) -> RunReport {
        let mut report = RunReport::start(self.failure_mode);

        for (position, config) in series.iter().enumerate() {
            let (series_report, stop) = self.run_series(config, position + 1).await;
            report.series.push(series_report);
            if stop {
                report.stopped_early = true;
                break;
            }
        }

        report.finish();
        info!(summary = %report.summary(), "run complete");
        report
    }

    /// Verify one series; the flag is `true` when the run must stop
    #[instrument(skip_all, fields(series = %series.name, position = number))]
    pub async fn run_series(&self, series: &SeriesConfig, number: usize) -> (SeriesReport, bool) {
        let mut report = SeriesReport::new(&series.name, &series.fixture_prefix, series.total_images);

        if number > 1 {
            if let Err(e) = self.navigator.switch_to(series, number).await {
                warn!(error = %e, "could not switch series");
                report.navigation_error = Some(e.to_string());
                return (report, self.failure_mode == FailureMode::FailFast);
            }
        }

        for index in 1..=series.total_images {
            let identity = match series.identity(index) {
                Ok(identity) => identity,
                Err(e) => {
                    report.navigation_error = Some(e.to_string());
                    return (report, self.failure_mode == FailureMode::FailFast);
                }
            };

            let start = Instant::now();
            let verdict = self.comparator.compare(&self.handle, &identity).await;
            let record = VerdictRecord::from_verdict(&verdict, start.elapsed());
            let failed = !record.passed;
            report.results.push(record);

            if failed && self.failure_mode == FailureMode::FailFast {
                return (report, true);
            }

            if index < series.total_images {
                if let Err(e) = self.navigator.next_image().await {
                    warn!(error = %e, index, "could not advance to next image");
                    report.navigation_error = Some(e.to_string());
                    return (report, self.failure_mode == FailureMode::FailFast);
                }
            }
        }

        (report, false)
    }
}
