//! Pixel-Diff Comparator
//!
//! Produces a pass/fail [`Verdict`] between a live capture and a stored
//! fixture, plus diagnostic artifacts.
//!
//! ```text
//!   stabilize ──► resolve URL ──┬─► fetch ──► decode (rendered) ─┐
//!                               │                                ├─► geometry ─► diff ─► persist ─► verdict
//!                               └─► fixture exists? ─► decode ───┘
//! ```
//!
//! The two branches run concurrently and are both awaited before any error is
//! reported. Errors are then ranked in pipeline order: fetch failure, missing
//! fixture, rendered decode, fixture decode.

use crate::artifacts::{
    ArtifactKind, ArtifactPaths, ArtifactReport, ArtifactWriter, DEFAULT_ARTIFACT_EXTENSION,
};
use crate::config::DEFAULT_FETCH_TIMEOUT_MS;
use crate::driver::{resolve_content_url, SurfaceDriver};
use crate::file_ops::FileStore;
use crate::image_data::{DecodedImage, DEFAULT_JPEG_QUALITY};
use crate::locator::SurfaceHandle;
use crate::result::{ErrorKind, ImageSide, VerificarError, VerificarResult};
use crate::visual_regression::{diff_images, DiffConfig};
use crate::wait::{StabilityOptions, StabilityResult, StabilizationMonitor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default fixture file extension
pub const DEFAULT_FIXTURE_EXTENSION: &str = "jpeg";

/// Default artifact directory
pub const DEFAULT_OUTPUT_DIR: &str = "output";

// =============================================================================
// IDENTITY
// =============================================================================

/// Names the fixture to compare against and the artifacts to write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonIdentity {
    /// Series prefix (e.g. `series_1`)
    pub series_prefix: String,
    /// 1-based image index within the series
    pub image_index: u32,
    /// Directory holding the series fixtures
    pub fixture_directory: PathBuf,
}

impl ComparisonIdentity {
    /// Create an identity
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Config`] if the prefix is empty or the index is 0
    pub fn new(
        series_prefix: impl Into<String>,
        image_index: u32,
        fixture_directory: impl Into<PathBuf>,
    ) -> VerificarResult<Self> {
        let series_prefix = series_prefix.into();
        if series_prefix.is_empty() {
            return Err(VerificarError::config("series prefix must not be empty"));
        }
        if image_index == 0 {
            return Err(VerificarError::config("image index starts at 1"));
        }
        Ok(Self {
            series_prefix,
            image_index,
            fixture_directory: fixture_directory.into(),
        })
    }

    /// `{series_prefix}_{image_index}`
    #[must_use]
    pub fn stem(&self) -> String {
        format!("{}_{}", self.series_prefix, self.image_index)
    }

    /// `{fixture_directory}/{series_prefix}_{image_index}.{extension}`
    #[must_use]
    pub fn fixture_path(&self, extension: &str) -> PathBuf {
        self.fixture_directory
            .join(format!("{}.{extension}", self.stem()))
    }
}

impl std::fmt::Display for ComparisonIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.series_prefix, self.image_index)
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Comparator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Stabilization timing
    pub stability: StabilityOptions,
    /// Per-pixel threshold
    pub diff: DiffConfig,
    /// Mismatched pixels tolerated before failing (0 = exact match)
    pub tolerance: u64,
    /// Where artifacts go
    pub output_dir: PathBuf,
    /// Fixture file extension
    pub fixture_extension: String,
    /// Artifact file extension
    pub artifact_extension: String,
    /// Diff JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Base URL for relative content identifiers
    pub base_url: Option<String>,
    /// Budget for fetching the rendered image
    pub fetch_timeout_ms: u64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            stability: StabilityOptions::default(),
            diff: DiffConfig::exact(),
            tolerance: 0,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            fixture_extension: DEFAULT_FIXTURE_EXTENSION.to_string(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            base_url: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl ComparatorConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set stabilization options
    #[must_use]
    pub const fn with_stability(mut self, stability: StabilityOptions) -> Self {
        self.stability = stability;
        self
    }

    /// Set the per-pixel threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u8) -> Self {
        self.diff = self.diff.with_threshold(threshold);
        self
    }

    /// Set the tolerated mismatched pixel count
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: u64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the fixture extension
    #[must_use]
    pub fn with_fixture_extension(mut self, ext: impl Into<String>) -> Self {
        self.fixture_extension = ext.into();
        self
    }

    /// Set the diff JPEG quality
    #[must_use]
    pub const fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the base URL for relative content identifiers
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the fetch budget in milliseconds
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = timeout_ms;
        self
    }

    /// Fetch budget as Duration
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Artifact locations for `identity`
    #[must_use]
    pub fn artifact_paths(&self, identity: &ComparisonIdentity) -> ArtifactPaths {
        ArtifactPaths::new(&self.output_dir, &identity.stem(), &self.artifact_extension)
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Output of a completed pixel scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    /// Pixels whose distance exceeds the threshold
    pub mismatched_pixel_count: u64,
    /// Pixels compared
    pub total_pixels: u64,
    /// Largest channel distance seen
    pub max_channel_diff: u8,
    /// Visualization, same geometry as the inputs
    pub diff_image: DecodedImage,
    /// Rendered capture exactly as fetched
    pub rendered_bytes: Vec<u8>,
}

/// Result of one comparison
#[derive(Debug)]
pub struct Verdict {
    /// What was compared
    pub identity: ComparisonIdentity,
    /// Whether the comparison passed
    pub passed: bool,
    /// Stabilization outcome (absent for offline captures or stabilization failures)
    pub stability: Option<StabilityResult>,
    /// Pixel scan output, when it ran
    pub diff: Option<DiffResult>,
    /// Why the comparison failed
    pub error: Option<VerificarError>,
    /// Where artifacts go
    pub artifact_paths: ArtifactPaths,
    /// What was persisted
    pub artifacts: ArtifactReport,
}

impl Verdict {
    fn failed(
        identity: ComparisonIdentity,
        error: VerificarError,
        artifact_paths: ArtifactPaths,
        artifacts: ArtifactReport,
    ) -> Self {
        Self {
            identity,
            passed: false,
            stability: None,
            diff: None,
            error: Some(error),
            artifact_paths,
            artifacts,
        }
    }

    /// Mismatched pixels, when the scan ran
    #[must_use]
    pub fn mismatched_pixel_count(&self) -> Option<u64> {
        self.diff.as_ref().map(|d| d.mismatched_pixel_count)
    }

    /// Classification of the failure, if any
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(VerificarError::kind)
    }

    /// Convert into a `Result`, for callers that assert with `?`
    ///
    /// # Errors
    ///
    /// Returns the failure carried by the verdict
    pub fn into_result(mut self) -> VerificarResult<Self> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Driver placeholder for comparisons of captures already on hand
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

// =============================================================================
// COMPARATOR
// =============================================================================

struct RenderedSide {
    bytes: Option<Vec<u8>>,
    image: VerificarResult<DecodedImage>,
}

/// Compares a live surface (or a capture) against fixtures
#[derive(Debug)]
pub struct PixelDiffComparator<D, F> {
    driver: D,
    store: F,
    config: ComparatorConfig,
}

impl<F: FileStore> PixelDiffComparator<Offline, F> {
    /// Comparator for captures already on hand, with no surface driver
    #[must_use]
    pub const fn offline(store: F, config: ComparatorConfig) -> Self {
        Self {
            driver: Offline,
            store,
            config,
        }
    }
}

impl<D, F: FileStore> PixelDiffComparator<D, F> {
    /// Create a comparator
    #[must_use]
    pub const fn new(driver: D, store: F, config: ComparatorConfig) -> Self {
        Self {
            driver,
            store,
            config,
        }
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Surface driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// File store
    #[must_use]
    pub const fn store(&self) -> &F {
        &self.store
    }

    /// Give the driver back, e.g. to shut a browser down
    #[must_use]
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Compare captured `rendered` bytes against the fixture named by `identity`
    ///
    /// Runs the pipeline from fixture resolution onward; no surface is touched.
    #[instrument(skip_all, fields(identity = %identity, bytes = rendered.len()))]
    pub async fn compare_capture(&self, rendered: Vec<u8>, identity: &ComparisonIdentity) -> Verdict {
        let rendered_side = async {
            let image = decode_blocking(rendered.clone(), ImageSide::Rendered).await;
            RenderedSide {
                bytes: Some(rendered),
                image,
            }
        };
        let (rendered_side, fixture) = tokio::join!(rendered_side, self.load_fixture(identity));
        self.conclude(identity, rendered_side, fixture, None).await
    }

    async fn load_fixture(&self, identity: &ComparisonIdentity) -> VerificarResult<DecodedImage> {
        let path = identity.fixture_path(&self.config.fixture_extension);
        if !self.store.exists(&path).await {
            return Err(VerificarError::FixtureNotFound { path });
        }
        let bytes = self.store.read_bytes(&path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "fixture loaded");
        decode_blocking(bytes, ImageSide::Fixture).await
    }

    async fn conclude(
        &self,
        identity: &ComparisonIdentity,
        rendered: RenderedSide,
        fixture: VerificarResult<DecodedImage>,
        stability: Option<StabilityResult>,
    ) -> Verdict {
        let paths = self.config.artifact_paths(identity);
        let mut writer = ArtifactWriter::new(&self.store, paths.clone());

        if let Some(bytes) = &rendered.bytes {
            writer.write(ArtifactKind::Rendered, bytes).await;
        }

        let (rendered_image, fixture_image) = match rank_errors(rendered.image, fixture) {
            Ok(images) => images,
            Err(e) => {
                info!(error = %e, "comparison failed before pixel scan");
                let mut verdict = Verdict::failed(identity.clone(), e, paths, writer.finish());
                verdict.stability = stability;
                return verdict;
            }
        };

        let diff_config = self.config.diff;
        let scan = tokio::task::spawn_blocking(move || {
            diff_images(&rendered_image, &fixture_image, diff_config)
        })
        .await
        .map_err(|e| VerificarError::Encode {
            message: format!("diff task failed: {e}"),
        })
        .and_then(|scan| scan);

        let pixel_diff = match scan {
            Ok(diff) => diff,
            Err(e) => {
                info!(error = %e, "comparison failed at geometry check");
                let mut verdict = Verdict::failed(identity.clone(), e, paths, writer.finish());
                verdict.stability = stability;
                return verdict;
            }
        };

        let quality = self.config.jpeg_quality;
        let diff_image = Arc::new(pixel_diff.diff_image);
        let encoder_input = Arc::clone(&diff_image);
        let encoded = tokio::task::spawn_blocking(move || encoder_input.encode_jpeg(quality))
            .await
            .map_err(|e| VerificarError::Encode {
                message: format!("encoder task failed: {e}"),
            })
            .and_then(|encoded| encoded);
        let diff_image = Arc::try_unwrap(diff_image).unwrap_or_else(|shared| (*shared).clone());
        writer.write_encoded(ArtifactKind::Diff, encoded).await;

        let mismatched = pixel_diff.mismatched_pixels;
        let tolerated = self.config.tolerance;
        let passed = mismatched <= tolerated;
        let error = (!passed).then(|| VerificarError::PixelMismatch {
            identity: identity.stem(),
            mismatched,
            tolerated,
        });

        info!(
            passed,
            mismatched,
            total = pixel_diff.total_pixels,
            max_channel_diff = pixel_diff.max_channel_diff,
            "comparison complete"
        );

        Verdict {
            identity: identity.clone(),
            passed,
            stability,
            diff: Some(DiffResult {
                mismatched_pixel_count: mismatched,
                total_pixels: pixel_diff.total_pixels,
                max_channel_diff: pixel_diff.max_channel_diff,
                diff_image,
                rendered_bytes: rendered.bytes.unwrap_or_default(),
            }),
            error,
            artifact_paths: paths,
            artifacts: writer.finish(),
        }
    }
}

impl<D: SurfaceDriver, F: FileStore> PixelDiffComparator<D, F> {
    /// Stabilize the surface, capture it and compare against the fixture
    ///
    /// Never panics or returns early with `Err`: every failure is carried in the
    /// returned [`Verdict`], stabilization failures verbatim.
    #[instrument(skip_all, fields(identity = %identity, surface = %handle))]
    pub async fn compare(&self, handle: &SurfaceHandle, identity: &ComparisonIdentity) -> Verdict {
        let stability = match StabilizationMonitor::new(&self.driver, self.config.stability)
            .await_stable(handle)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                info!(error = %e, "surface did not stabilize");
                return Verdict::failed(
                    identity.clone(),
                    e,
                    self.config.artifact_paths(identity),
                    ArtifactReport::default(),
                );
            }
        };

        let url = match resolve_content_url(
            self.config.base_url.as_deref(),
            &stability.final_content_id,
        ) {
            Ok(url) => url,
            Err(e) => {
                let mut verdict = Verdict::failed(
                    identity.clone(),
                    e,
                    self.config.artifact_paths(identity),
                    ArtifactReport::default(),
                );
                verdict.stability = Some(stability);
                return verdict;
            }
        };

        let (rendered_side, fixture) =
            tokio::join!(self.capture(&url), self.load_fixture(identity));
        self.conclude(identity, rendered_side, fixture, Some(stability))
            .await
    }

    async fn capture(&self, url: &str) -> RenderedSide {
        let timeout = self.config.fetch_timeout();
        let fetched = match tokio::time::timeout(timeout, self.driver.fetch_bytes(url)).await {
            Ok(Ok(response)) => response.into_body(url),
            Ok(Err(e @ VerificarError::FetchFailed { .. })) => Err(e),
            Ok(Err(e)) => Err(VerificarError::fetch(url, None, e.to_string())),
            Err(_) => Err(VerificarError::fetch(
                url,
                None,
                format!("no response within {}ms", self.config.fetch_timeout_ms),
            )),
        };
        match fetched {
            Ok(bytes) => {
                debug!(url, bytes = bytes.len(), "rendered artifact fetched");
                let image = decode_blocking(bytes.clone(), ImageSide::Rendered).await;
                RenderedSide {
                    bytes: Some(bytes),
                    image,
                }
            }
            Err(e) => RenderedSide {
                bytes: None,
                image: Err(e),
            },
        }
    }
}

async fn decode_blocking(bytes: Vec<u8>, side: ImageSide) -> VerificarResult<DecodedImage> {
    tokio::task::spawn_blocking(move || DecodedImage::decode(&bytes, side))
        .await
        .map_err(|e| VerificarError::decode(side, format!("decoder task failed: {e}")))?
}

/// Pick the error to report once both branches have completed
fn rank_errors(
    rendered: VerificarResult<DecodedImage>,
    fixture: VerificarResult<DecodedImage>,
) -> VerificarResult<(DecodedImage, DecodedImage)> {
    match (rendered, fixture) {
        (Ok(r), Ok(f)) => Ok((r, f)),
        (Err(e @ VerificarError::FetchFailed { .. }), _) => Err(e),
        (_, Err(e @ VerificarError::FixtureNotFound { .. })) | (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::{FetchResponse, MockContent, MockDriver};
    use crate::file_ops::{LocalFileStore, MemoryFileStore};
    use std::path::Path;
    use std::time::Duration;

    const URL: &str = "http://viewer.test/images/series1/3.jpeg";

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        DecodedImage::filled(width, height, rgba).encode_png().unwrap()
    }

    fn identity() -> ComparisonIdentity {
        ComparisonIdentity::new("series_1", 3, "fixture/series1").unwrap()
    }

    fn config() -> ComparatorConfig {
        ComparatorConfig::new()
            .with_stability(
                StabilityOptions::new()
                    .with_settle_window(200)
                    .with_max_wait(1_000),
            )
            .with_output_dir("output")
    }

    fn fixture_store(bytes: Vec<u8>) -> MemoryFileStore {
        MemoryFileStore::new().with_file("fixture/series1/series_1_3.jpeg", bytes)
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn test_fixture_path() {
            let id = identity();
            assert_eq!(
                id.fixture_path("jpeg"),
                PathBuf::from("fixture/series1/series_1_3.jpeg")
            );
            assert_eq!(id.to_string(), "series_1_3");
        }

        #[test]
        fn test_index_starts_at_one() {
            assert!(ComparisonIdentity::new("series_1", 0, "f").is_err());
            assert!(ComparisonIdentity::new("", 1, "f").is_err());
        }

        #[test]
        fn test_rank_prefers_fetch_then_fixture() {
            let fetch = VerificarError::fetch("u", Some(404), "status 404");
            let missing = VerificarError::FixtureNotFound {
                path: PathBuf::from("f/x.jpeg"),
            };
            let err = rank_errors(Err(fetch), Err(missing)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FetchFailed);

            let decode = VerificarError::decode(ImageSide::Rendered, "bad");
            let missing = VerificarError::FixtureNotFound {
                path: PathBuf::from("f/x.jpeg"),
            };
            let err = rank_errors(Err(decode), Err(missing)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FixtureNotFound);

            let rendered = VerificarError::decode(ImageSide::Rendered, "bad");
            let fixture = VerificarError::decode(ImageSide::Fixture, "bad");
            match rank_errors(Err(rendered), Err(fixture)).unwrap_err() {
                VerificarError::DecodeError { side, .. } => assert_eq!(side, ImageSide::Rendered),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    mod compare_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_idempotent_pass() {
            let image = png(8, 6, [10, 20, 30, 255]);
            let driver = MockDriver::serving(URL, image.clone());
            let comparator = PixelDiffComparator::new(driver, fixture_store(image), config());

            for _ in 0..3 {
                let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
                assert!(verdict.passed, "{:?}", verdict.error);
                assert_eq!(verdict.mismatched_pixel_count(), Some(0));
                assert!(verdict.stability.as_ref().unwrap().is_stable());
                assert!(verdict.artifacts.is_complete());
            }
            assert_eq!(comparator.driver().call_count("fetch_bytes"), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_pixel_mismatch_writes_named_artifacts() {
            let fixture = DecodedImage::filled(4, 4, [0, 0, 0, 255]);
            let mut rendered = fixture.clone();
            rendered.set_pixel(1, 1, [255, 255, 255, 255]);
            rendered.set_pixel(2, 3, [0, 0, 1, 255]);

            let driver = MockDriver::serving(URL, rendered.encode_png().unwrap());
            let store = fixture_store(fixture.encode_png().unwrap());
            let comparator = PixelDiffComparator::new(driver, store, config());

            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert!(!verdict.passed);
            assert_eq!(verdict.mismatched_pixel_count(), Some(2));
            match verdict.error.as_ref().unwrap() {
                VerificarError::PixelMismatch {
                    identity,
                    mismatched,
                    tolerated,
                } => {
                    assert_eq!(identity, "series_1_3");
                    assert_eq!(*mismatched, 2);
                    assert_eq!(*tolerated, 0);
                }
                other => panic!("unexpected error: {other}"),
            }
            let diff_image = &verdict.diff.as_ref().unwrap().diff_image;
            assert_eq!(diff_image.pixel(1, 1), Some(crate::visual_regression::MISMATCH_COLOR));
            assert_eq!(diff_image.pixel(2, 3), Some(crate::visual_regression::MISMATCH_COLOR));

            let store = comparator.store();
            assert_eq!(
                store.paths(),
                vec![
                    PathBuf::from("fixture/series1/series_1_3.jpeg"),
                    PathBuf::from("output/diff_series_1_3.jpg"),
                    PathBuf::from("output/rendered_series_1_3.jpg"),
                ]
            );
            let written = store.get(Path::new("output/rendered_series_1_3.jpg")).unwrap();
            assert_eq!(written, rendered.encode_png().unwrap());
            let diff = store.get(Path::new("output/diff_series_1_3.jpg")).unwrap();
            assert_eq!(&diff[..2], &[0xFF, 0xD8]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_tolerance_allows_small_mismatch() {
            let fixture = DecodedImage::filled(4, 4, [0, 0, 0, 255]);
            let mut rendered = fixture.clone();
            rendered.set_pixel(0, 0, [9, 9, 9, 255]);

            let driver = MockDriver::serving(URL, rendered.encode_png().unwrap());
            let comparator = PixelDiffComparator::new(
                driver,
                fixture_store(fixture.encode_png().unwrap()),
                config().with_tolerance(1),
            );
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert!(verdict.passed);
            assert_eq!(verdict.mismatched_pixel_count(), Some(1));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_fixture_names_path() {
            let driver = MockDriver::serving(URL, png(2, 2, [0, 0, 0, 255]));
            let comparator = PixelDiffComparator::new(driver, MemoryFileStore::new(), config());
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;

            assert!(!verdict.passed);
            match verdict.error.as_ref().unwrap() {
                VerificarError::FixtureNotFound { path } => {
                    assert_eq!(path, &PathBuf::from("fixture/series1/series_1_3.jpeg"));
                }
                other => panic!("unexpected error: {other}"),
            }
            // the capture is still kept for inspection
            assert!(comparator
                .store()
                .get(Path::new("output/rendered_series_1_3.jpg"))
                .is_some());
            assert!(verdict.mismatched_pixel_count().is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_fetch_404_fails() {
            let driver = MockDriver::new()
                .with_content(MockContent::Static(URL.to_string()))
                .with_response(URL, FetchResponse::not_found());
            let comparator = PixelDiffComparator::new(
                driver,
                fixture_store(png(2, 2, [0, 0, 0, 255])),
                config(),
            );
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert_eq!(verdict.error_kind(), Some(ErrorKind::FetchFailed));
            assert!(verdict.artifacts.written.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_fetch_empty_body_fails() {
            let driver = MockDriver::serving(URL, Vec::new());
            let comparator = PixelDiffComparator::new(
                driver,
                fixture_store(png(2, 2, [0, 0, 0, 255])),
                config(),
            );
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert_eq!(verdict.error_kind(), Some(ErrorKind::FetchFailed));
        }

        #[tokio::test(start_paused = true)]
        async fn test_geometry_mismatch() {
            let driver = MockDriver::serving(URL, png(100, 100, [0, 0, 0, 255]));
            let comparator = PixelDiffComparator::new(
                driver,
                fixture_store(png(100, 101, [0, 0, 0, 255])),
                config(),
            );
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert_eq!(verdict.error_kind(), Some(ErrorKind::GeometryMismatch));
            assert!(verdict.diff.is_none());
            let paths = &verdict.artifact_paths;
            assert!(verdict.artifacts.contains(paths, ArtifactKind::Rendered));
            assert!(!verdict.artifacts.contains(paths, ArtifactKind::Diff));
        }

        #[tokio::test(start_paused = true)]
        async fn test_fixture_decode_error() {
            let driver = MockDriver::serving(URL, png(2, 2, [0, 0, 0, 255]));
            let comparator =
                PixelDiffComparator::new(driver, fixture_store(b"not an image".to_vec()), config());
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            match verdict.error.unwrap() {
                VerificarError::DecodeError { side, .. } => assert_eq!(side, ImageSide::Fixture),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_unstable_surface_propagates() {
            let driver = MockDriver::new().with_content(MockContent::Changing {
                prefix: URL.to_string(),
                period: Duration::from_millis(50),
            });
            let comparator = PixelDiffComparator::new(driver, MemoryFileStore::new(), config());
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert_eq!(verdict.error_kind(), Some(ErrorKind::Unstable));
            assert!(!comparator.driver().was_called("fetch_bytes"));
            assert!(verdict.artifacts.written.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_relative_content_id_uses_base_url() {
            let image = png(3, 3, [1, 2, 3, 255]);
            let driver = MockDriver::new()
                .with_content(MockContent::Static("/images/series1/3.jpeg".to_string()))
                .with_resource(URL, image.clone());
            let comparator = PixelDiffComparator::new(
                driver,
                fixture_store(image),
                config().with_base_url("http://viewer.test/"),
            );
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert!(verdict.passed, "{:?}", verdict.error);
        }

        #[tokio::test(start_paused = true)]
        async fn test_read_only_store_does_not_change_verdict() {
            let image = png(4, 4, [5, 5, 5, 255]);
            let store = MemoryFileStore::new()
                .with_file("fixture/series1/series_1_3.jpeg", image.clone())
                .read_only();
            let comparator =
                PixelDiffComparator::new(MockDriver::serving(URL, image), store, config());
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;
            assert!(verdict.passed);
            assert!(!verdict.artifacts.is_complete());
            assert!(verdict.into_result().is_ok());
        }

        /// Surface that settles at `URL` but whose fetch misbehaves
        struct BrokenFetch {
            hang: bool,
        }

        #[async_trait::async_trait]
        impl SurfaceDriver for BrokenFetch {
            async fn is_visible(&self, _handle: &SurfaceHandle) -> VerificarResult<bool> {
                Ok(true)
            }

            async fn get_attribute(
                &self,
                _handle: &SurfaceHandle,
                _name: &str,
            ) -> VerificarResult<Option<String>> {
                Ok(Some(URL.to_string()))
            }

            async fn wait_for_network_idle(&self, _timeout: Duration) -> VerificarResult<()> {
                Ok(())
            }

            async fn fetch_bytes(&self, _url: &str) -> VerificarResult<FetchResponse> {
                if self.hang {
                    std::future::pending().await
                } else {
                    Err(VerificarError::driver("connection reset"))
                }
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_transport_error_is_fetch_failure() {
            let comparator = PixelDiffComparator::new(
                BrokenFetch { hang: false },
                MemoryFileStore::new(),
                config(),
            );
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;

            assert_eq!(verdict.error_kind(), Some(ErrorKind::FetchFailed));
            match verdict.error.as_ref().unwrap() {
                VerificarError::FetchFailed { url, status, message } => {
                    assert_eq!(url, URL);
                    assert_eq!(*status, None);
                    assert!(message.contains("connection reset"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_unanswered_fetch_times_out() {
            let comparator = PixelDiffComparator::new(
                BrokenFetch { hang: true },
                fixture_store(png(2, 2, [0, 0, 0, 255])),
                config().with_fetch_timeout(5_000),
            );
            let start = tokio::time::Instant::now();
            let verdict = comparator.compare(&SurfaceHandle::test_id("medical-image"), &identity()).await;

            assert_eq!(verdict.error_kind(), Some(ErrorKind::FetchFailed));
            assert!(verdict.error.unwrap().to_string().contains("5000ms"));
            assert!(start.elapsed() < Duration::from_secs(6));
        }
    }

    mod capture_tests {
        use super::*;

        #[tokio::test]
        async fn test_offline_capture_on_disk() {
            let temp = tempfile::tempdir().unwrap();
            let fixtures = temp.path().join("fixture").join("series2");
            std::fs::create_dir_all(&fixtures).unwrap();
            let image = png(5, 5, [200, 100, 50, 255]);
            std::fs::write(fixtures.join("series_2_1.jpeg"), &image).unwrap();

            let out = temp.path().join("output");
            let comparator = PixelDiffComparator::offline(
                LocalFileStore::new(),
                ComparatorConfig::new().with_output_dir(&out),
            );
            let id = ComparisonIdentity::new("series_2", 1, &fixtures).unwrap();
            let verdict = comparator.compare_capture(image, &id).await;

            assert!(verdict.passed);
            assert!(verdict.stability.is_none());
            assert!(out.join("rendered_series_2_1.jpg").is_file());
            assert!(out.join("diff_series_2_1.jpg").is_file());
        }

        #[tokio::test]
        async fn test_rendered_decode_error() {
            let comparator = PixelDiffComparator::offline(
                fixture_store(png(2, 2, [0, 0, 0, 255])),
                ComparatorConfig::new(),
            );
            let verdict = comparator.compare_capture(vec![1, 2, 3], &identity()).await;
            match verdict.into_result().unwrap_err() {
                VerificarError::DecodeError { side, .. } => assert_eq!(side, ImageSide::Rendered),
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
