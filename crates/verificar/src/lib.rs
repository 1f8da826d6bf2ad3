//! Verificar: pixel-exact visual regression checks for live image surfaces
//!
//! Verificar (Spanish: "to verify") waits for a displayed image to stop
//! changing, captures it, and compares it pixel by pixel against a stored
//! fixture, leaving the capture and a diff visualization behind for inspection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     VERIFICAR Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │   │ Stabilize   │   │ Fetch +     │   │ Geometry +  │            │
//! │   │ (wait.rs)   │──►│ Decode      │──►│ Pixel Diff  │──► Verdict │
//! │   │             │   │ (fork/join) │   │             │            │
//! │   └─────────────┘   └─────────────┘   └─────────────┘            │
//! │          ▲                 ▲                  │                  │
//! │   SurfaceDriver       FileStore          artifacts/              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use verificar::{
//!     ComparatorConfig, ComparisonIdentity, LocalFileStore, MockDriver, PixelDiffComparator,
//!     SurfaceHandle,
//! };
//!
//! # async fn run() -> verificar::VerificarResult<()> {
//! let driver = MockDriver::serving("http://viewer.test/1.jpeg", std::fs::read("capture.jpeg")?);
//! let comparator = PixelDiffComparator::new(driver, LocalFileStore::new(), ComparatorConfig::new());
//! let identity = ComparisonIdentity::new("series_1", 1, "fixture/series1")?;
//!
//! let verdict = comparator
//!     .compare(&SurfaceHandle::test_id("medical-image"), &identity)
//!     .await;
//! verdict.into_result()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod artifacts;
#[cfg(feature = "browser")]
mod browser;
mod comparator;
mod config;
mod driver;
mod file_ops;
mod image_data;
mod locator;
mod reporter;
mod result;
mod series;
mod visual_regression;
mod wait;

pub use artifacts::{
    ArtifactFailure, ArtifactKind, ArtifactPaths, ArtifactReport, ArtifactWriter,
    DEFAULT_ARTIFACT_EXTENSION,
};
#[cfg(feature = "browser")]
pub use browser::{BrowserOptions, ChromiumSurfaceDriver};
pub use comparator::{
    ComparatorConfig, ComparisonIdentity, DiffResult, Offline, PixelDiffComparator, Verdict,
    DEFAULT_FIXTURE_EXTENSION, DEFAULT_OUTPUT_DIR,
};
pub use config::{
    default_series, ComparisonConfig, NavigationConfig, PathsConfig, SeriesConfig, SurfaceConfig,
    VerificarConfig, DEFAULT_AFTER_NEXT_MS, DEFAULT_AFTER_SERIES_SWITCH_MS,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_SURFACE_TEST_ID,
};
#[cfg(feature = "http")]
pub use driver::HttpFetcher;
pub use driver::{
    decode_data_url, resolve_content_url, FetchResponse, MockContent, MockDriver, MockVisibility,
    SurfaceDriver, ViewerControls,
};
pub use file_ops::{FileStore, LocalFileStore, MemoryFileStore};
pub use image_data::{DecodedImage, Geometry, DEFAULT_JPEG_QUALITY, RGBA_CHANNELS};
pub use locator::{Selector, SurfaceHandle, DEFAULT_CONTENT_ATTRIBUTE};
pub use reporter::{FailureMode, RunReport, SeriesReport, VerdictRecord};
pub use result::{ErrorKind, ImageSide, VerificarError, VerificarResult};
pub use series::{SeriesNavigator, SeriesRunner, ViewerNavigator};
pub use visual_regression::{
    channel_distance, check_geometry, diff_images, DiffConfig, PixelDiff, MATCHED_ALPHA,
    MISMATCH_COLOR,
};
pub use wait::{
    await_stable, RetryPolicy, StabilityOptions, StabilityResult, StabilityState,
    StabilizationMonitor, DEFAULT_MAX_WAIT_MS, DEFAULT_NETWORK_IDLE_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_WINDOW_MS, NETWORK_IDLE_THRESHOLD_MS,
};
