//! Stabilization Monitor
//!
//! Decides when a live surface has stopped changing, so the comparator never
//! samples a transient state (mid-animation, mid-load).
//!
//! ```text
//!   visible? ──► network idle ──► sample ─ settle ─ sample
//!                                      │
//!                      Pending ────────┼──► Stable   (samples equal)
//!                                      └──► Unstable (samples differ)
//! ```
//!
//! The default [`RetryPolicy`] takes exactly one pair of samples and fails on
//! the first change. Callers that prefer to ride out short animations can allow
//! more attempts with exponential backoff, bounded by the same wait budget.

use crate::driver::SurfaceDriver;
use crate::locator::SurfaceHandle;
use crate::result::{VerificarError, VerificarResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default budget for the surface to become visible (10 seconds)
pub const DEFAULT_MAX_WAIT_MS: u64 = 10_000;

/// Default settle window (3 seconds)
pub const DEFAULT_SETTLE_WINDOW_MS: u64 = 3_000;

/// Default budget for network idle (30 seconds)
pub const DEFAULT_NETWORK_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Default visibility polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

// =============================================================================
// RETRY POLICY
// =============================================================================

/// How often an unstable surface is re-sampled before giving up
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total sample pairs allowed (1 = single shot)
    pub max_attempts: u32,
    /// Pause before the second attempt
    pub initial_backoff_ms: u64,
    /// Growth factor of the pause between attempts
    pub multiplier: f64,
    /// Upper bound of a single pause
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_shot()
    }
}

impl RetryPolicy {
    /// One sample pair, no retry
    #[must_use]
    pub const fn single_shot() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 250,
            multiplier: 2.0,
            max_backoff_ms: 4_000,
        }
    }

    /// Exponential backoff with `max_attempts` sample pairs
    #[must_use]
    pub const fn exponential(max_attempts: u32, initial_backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            multiplier: 2.0,
            max_backoff_ms: 4_000,
        }
    }

    /// Pause after the given (1-based) failed attempt
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let ms = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis((ms as u64).min(self.max_backoff_ms))
    }
}

// =============================================================================
// STABILITY OPTIONS
// =============================================================================

/// Timing of a stabilization check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityOptions {
    /// Budget for the surface to become visible, also bounds retries
    pub max_wait_ms: u64,
    /// How long the content identifier must stay unchanged
    pub settle_window_ms: u64,
    /// Budget for the network idle signal
    pub network_idle_timeout_ms: u64,
    /// Visibility polling interval
    pub poll_interval_ms: u64,
    /// Re-sampling policy for unstable surfaces
    pub retry: RetryPolicy,
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            settle_window_ms: DEFAULT_SETTLE_WINDOW_MS,
            network_idle_timeout_ms: DEFAULT_NETWORK_IDLE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry: RetryPolicy::single_shot(),
        }
    }
}

impl StabilityOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the visibility / total wait budget in milliseconds
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = max_wait_ms;
        self
    }

    /// Set the settle window in milliseconds
    #[must_use]
    pub const fn with_settle_window(mut self, settle_window_ms: u64) -> Self {
        self.settle_window_ms = settle_window_ms;
        self
    }

    /// Set the network idle budget in milliseconds
    #[must_use]
    pub const fn with_network_idle_timeout(mut self, timeout_ms: u64) -> Self {
        self.network_idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the visibility polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Wait budget as Duration
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Settle window as Duration
    #[must_use]
    pub const fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }

    /// Network idle budget as Duration
    #[must_use]
    pub const fn network_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.network_idle_timeout_ms)
    }

    /// Poll interval as Duration (never zero)
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// =============================================================================
// STABILITY STATE / RESULT
// =============================================================================

/// State of one stabilization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityState {
    /// Samples not yet compared
    Pending,
    /// Identifier unchanged across the settle window
    Stable,
    /// Identifier changed across the settle window
    Unstable,
}

impl StabilityState {
    /// Transition out of `Pending` given two samples
    #[must_use]
    pub fn from_samples(before: &str, after: &str) -> Self {
        if before == after {
            Self::Stable
        } else {
            Self::Unstable
        }
    }

    /// Whether the state is final
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Outcome of a successful stabilization check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityResult {
    /// Terminal state (always `Stable` when returned as `Ok`)
    pub state: StabilityState,
    /// Identifier observed at the end of the settle window
    pub final_content_id: String,
    /// Time from the start of the check until stability was confirmed
    pub elapsed: Duration,
    /// Sample pairs taken
    pub attempts: u32,
}

impl StabilityResult {
    /// Whether the surface settled
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.state == StabilityState::Stable
    }
}

// =============================================================================
// MONITOR
// =============================================================================

/// Waits for a surface to become visible and stop changing
#[derive(Debug)]
pub struct StabilizationMonitor<'a, D: ?Sized> {
    driver: &'a D,
    options: StabilityOptions,
}

impl<'a, D: SurfaceDriver + ?Sized> StabilizationMonitor<'a, D> {
    /// Create a monitor over `driver`
    #[must_use]
    pub const fn new(driver: &'a D, options: StabilityOptions) -> Self {
        Self { driver, options }
    }

    /// Options in use
    #[must_use]
    pub const fn options(&self) -> &StabilityOptions {
        &self.options
    }

    /// Block until `handle` is visible and its content identifier has settled
    ///
    /// # Errors
    ///
    /// - [`VerificarError::NotVisible`] if the surface is not visible within the budget
    /// - [`VerificarError::Unstable`] if the identifier changed on every allowed attempt
    /// - [`VerificarError::MissingContentId`] if the surface has no identifier
    /// - [`VerificarError::Timeout`] if the network never went idle
    #[instrument(skip(self), fields(surface = %handle))]
    pub async fn await_stable(&self, handle: &SurfaceHandle) -> VerificarResult<StabilityResult> {
        let start = Instant::now();
        self.wait_for_visible(handle, start).await?;
        self.wait_for_network_idle().await?;

        let settle = self.options.settle_window();
        let retry = self.options.retry;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let before = self.sample(handle).await?;
            tokio::time::sleep(settle).await;
            let after = self.sample(handle).await?;

            let state = StabilityState::from_samples(&before, &after);
            if state == StabilityState::Stable {
                let elapsed = start.elapsed();
                debug!(content_id = %after, attempts, ?elapsed, "surface stable");
                return Ok(StabilityResult {
                    state,
                    final_content_id: after,
                    elapsed,
                    attempts,
                });
            }

            warn!(%before, %after, attempts, "content identifier changed within settle window");

            let backoff = retry.backoff(attempts);
            let remaining = self.options.max_wait().saturating_sub(start.elapsed());
            if attempts >= retry.max_attempts.max(1) || backoff + settle > remaining {
                return Err(VerificarError::Unstable {
                    selector: handle.selector.to_string(),
                    before,
                    after,
                    settle_ms: self.options.settle_window_ms,
                    attempts,
                });
            }
            tokio::time::sleep(backoff).await;
        }
    }

    async fn wait_for_visible(&self, handle: &SurfaceHandle, start: Instant) -> VerificarResult<()> {
        let deadline = start + self.options.max_wait();
        let poll = self.options.poll_interval();

        let not_visible = || VerificarError::NotVisible {
            selector: handle.selector.to_string(),
            timeout_ms: self.options.max_wait_ms,
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.driver.is_visible(handle)).await {
                Ok(Ok(true)) => {
                    debug!(waited = ?start.elapsed(), "surface visible");
                    return Ok(());
                }
                Ok(Ok(false)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(not_visible()),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(not_visible());
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    async fn wait_for_network_idle(&self) -> VerificarResult<()> {
        let budget = self.options.network_idle_timeout();
        tokio::time::timeout(budget, self.driver.wait_for_network_idle(budget))
            .await
            .map_err(|_| VerificarError::Timeout {
                operation: "network idle".to_string(),
                ms: self.options.network_idle_timeout_ms,
            })?
    }

    async fn sample(&self, handle: &SurfaceHandle) -> VerificarResult<String> {
        self.driver
            .get_attribute(handle, &handle.content_attribute)
            .await?
            .ok_or_else(|| VerificarError::MissingContentId {
                selector: handle.selector.to_string(),
                attribute: handle.content_attribute.clone(),
            })
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Single-shot stabilization check with explicit settle window and wait budget
///
/// # Errors
///
/// See [`StabilizationMonitor::await_stable`]
pub async fn await_stable<D: SurfaceDriver + ?Sized>(
    driver: &D,
    handle: &SurfaceHandle,
    settle_window: Duration,
    max_wait: Duration,
) -> VerificarResult<StabilityResult> {
    let options = StabilityOptions::new()
        .with_settle_window(settle_window.as_millis() as u64)
        .with_max_wait(max_wait.as_millis() as u64);
    StabilizationMonitor::new(driver, options)
        .await_stable(handle)
        .await
}

// =============================================================================
// TESTS
// =============================================================================
