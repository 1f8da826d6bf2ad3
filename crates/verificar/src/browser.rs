//! Chromium surface driver.
//!
//! Drives a real page over the Chrome `DevTools` Protocol (chromiumoxide) and
//! implements [`SurfaceDriver`] and [`ViewerControls`] on top of it. Rendered
//! images are downloaded with [`HttpFetcher`], not through the page.

use crate::driver::{FetchResponse, HttpFetcher, SurfaceDriver, ViewerControls};
use crate::locator::{Selector, SurfaceHandle};
use crate::result::{VerificarError, VerificarResult};
use crate::wait::NETWORK_IDLE_THRESHOLD_MS;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Interval between network idle checks
const IDLE_POLL_MS: u64 = 100;

/// Load state and time since the last finished resource
const NETWORK_STATE_SCRIPT: &str = "(() => { \
    const entries = performance.getEntriesByType('resource'); \
    const last = entries.reduce((m, e) => Math.max(m, e.responseEnd), 0); \
    return { ready: document.readyState === 'complete', \
             idle_ms: performance.now() - last }; })()";

/// Browser launch options
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a window
    pub headless: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 1024,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

#[derive(Debug, Deserialize)]
struct AttributeReading {
    value: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize)]
struct NetworkState {
    ready: bool,
    idle_ms: f64,
}

/// JSON-quoted JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// [`SurfaceDriver`] backed by a Chromium page
#[derive(Debug)]
pub struct ChromiumSurfaceDriver {
    browser: Arc<Mutex<CdpBrowser>>,
    page: CdpPage,
    fetcher: HttpFetcher,
    #[allow(dead_code)]
    handler: tokio::task::JoinHandle<()>,
}

impl ChromiumSurfaceDriver {
    /// Launch Chromium and open a blank page
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Driver`] if the browser cannot be launched
    pub async fn launch(options: &BrowserOptions, fetch_timeout: Duration) -> VerificarResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(options.viewport_width, options.viewport_height);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| VerificarError::driver(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| VerificarError::driver(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| VerificarError::driver(format!("failed to open page: {e}")))?;

        info!(headless = options.headless, "browser launched");
        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page,
            fetcher: HttpFetcher::new(fetch_timeout)?,
            handler,
        })
    }

    /// Navigate to `url`
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Driver`] if navigation fails
    pub async fn goto(&self, url: &str) -> VerificarResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| VerificarError::driver(format!("navigation to {url} failed: {e}")))?;
        debug!(url, "navigated");
        Ok(())
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Driver`] if the browser does not shut down cleanly
    pub async fn close(self) -> VerificarResult<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| VerificarError::driver(format!("failed to close browser: {e}")))?;
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> VerificarResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| VerificarError::driver(format!("script evaluation failed: {e}")))?
            .into_value()
            .map_err(|e| VerificarError::driver(format!("unexpected script result: {e}")))
    }
}

#[async_trait]
impl SurfaceDriver for ChromiumSurfaceDriver {
    async fn is_visible(&self, handle: &SurfaceHandle) -> VerificarResult<bool> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            handle.selector.to_query()
        );
        self.eval(&script).await
    }

    async fn get_attribute(
        &self,
        handle: &SurfaceHandle,
        name: &str,
    ) -> VerificarResult<Option<String>> {
        let script = format!(
            "(() => {{ const el = {}; return {{ value: el ? el.getAttribute({}) : null }}; }})()",
            handle.selector.to_query(),
            js_string(name)
        );
        Ok(self.eval::<AttributeReading>(&script).await?.value)
    }

    /// Idle means the document finished loading and no resource completed in
    /// the last [`NETWORK_IDLE_THRESHOLD_MS`]. Requests still in flight are not
    /// visible to Resource Timing, so a single long download can pass as idle.
    async fn wait_for_network_idle(&self, timeout: Duration) -> VerificarResult<()> {
        let deadline = Instant::now() + timeout;
        let threshold = NETWORK_IDLE_THRESHOLD_MS as f64;

        loop {
            let state: NetworkState = self.eval(NETWORK_STATE_SCRIPT).await?;
            if state.ready && state.idle_ms >= threshold {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(VerificarError::Timeout {
                    operation: "network idle".to_string(),
                    ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(Duration::from_millis(IDLE_POLL_MS)).await;
        }
    }

    async fn fetch_bytes(&self, url: &str) -> VerificarResult<FetchResponse> {
        self.fetcher.fetch(url).await
    }
}

#[async_trait]
impl ViewerControls for ChromiumSurfaceDriver {
    async fn click(&self, selector: &Selector) -> VerificarResult<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            selector.to_query()
        );
        if self.eval::<bool>(&script).await? {
            debug!(%selector, "clicked");
            Ok(())
        } else {
            Err(VerificarError::driver(format!("no element matches {selector}")))
        }
    }
}
