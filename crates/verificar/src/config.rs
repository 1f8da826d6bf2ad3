//! Run configuration.
//!
//! Every wait that drives a comparison is a named value here rather than a
//! literal in code. Configuration is plain YAML:
//!
//! ```yaml
//! surface:
//!   selector: { kind: test_id, value: medical-image }
//!   content_attribute: src
//! stability:
//!   max_wait_ms: 10000
//!   settle_window_ms: 3000
//! comparison:
//!   tolerance: 0
//!   threshold: 0
//! series:
//!   - name: Series 1
//!     fixture_prefix: series_1
//!     total_images: 7
//!     fixture_path: fixture/series1
//! ```

use crate::artifacts::DEFAULT_ARTIFACT_EXTENSION;
use crate::comparator::{
    ComparatorConfig, ComparisonIdentity, DEFAULT_FIXTURE_EXTENSION, DEFAULT_OUTPUT_DIR,
};
use crate::image_data::DEFAULT_JPEG_QUALITY;
use crate::locator::{Selector, SurfaceHandle, DEFAULT_CONTENT_ATTRIBUTE};
use crate::result::{VerificarError, VerificarResult};
use crate::visual_regression::DiffConfig;
use crate::wait::StabilityOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default fetch timeout (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Default pause after advancing to the next image (1 second)
pub const DEFAULT_AFTER_NEXT_MS: u64 = 1_000;

/// Default pause after switching series (5 seconds)
pub const DEFAULT_AFTER_SERIES_SWITCH_MS: u64 = 5_000;

/// Default test ID of the surface under test
pub const DEFAULT_SURFACE_TEST_ID: &str = "medical-image";

/// Which surface to observe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// How the surface is located
    pub selector: Selector,
    /// Attribute carrying the content identifier
    pub content_attribute: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            selector: Selector::test_id(DEFAULT_SURFACE_TEST_ID),
            content_attribute: DEFAULT_CONTENT_ATTRIBUTE.to_string(),
        }
    }
}

impl SurfaceConfig {
    /// Handle for the configured surface
    #[must_use]
    pub fn handle(&self) -> SurfaceHandle {
        SurfaceHandle::new(self.selector.clone()).with_content_attribute(&self.content_attribute)
    }
}

/// Pixel comparison policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Mismatched pixels tolerated (0 = exact match)
    pub tolerance: u64,
    /// Per-pixel channel distance still considered equal (0 = bit-exact)
    pub threshold: u8,
    /// Diff JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            tolerance: 0,
            threshold: 0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

/// Artifact and fixture file layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Artifact directory
    pub output_dir: PathBuf,
    /// Fixture file extension
    pub fixture_extension: String,
    /// Artifact file extension
    pub artifact_extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            fixture_extension: DEFAULT_FIXTURE_EXTENSION.to_string(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
        }
    }
}

/// One image series and its fixtures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Display name (also the label of its selector button)
    pub name: String,
    /// Fixture and artifact prefix (e.g. `series_1`)
    pub fixture_prefix: String,
    /// Number of images, indexed from 1
    pub total_images: u32,
    /// Directory holding this series' fixtures
    pub fixture_path: PathBuf,
}

impl SeriesConfig {
    /// Create a series definition
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        fixture_prefix: impl Into<String>,
        total_images: u32,
        fixture_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            fixture_prefix: fixture_prefix.into(),
            total_images,
            fixture_path: fixture_path.into(),
        }
    }

    /// Identity of image `index` (1-based)
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Config`] if `index` is outside `1..=total_images`
    pub fn identity(&self, index: u32) -> VerificarResult<ComparisonIdentity> {
        if index > self.total_images {
            return Err(VerificarError::config(format!(
                "{} has {} images, index {index} is out of range",
                self.name, self.total_images
            )));
        }
        ComparisonIdentity::new(&self.fixture_prefix, index, &self.fixture_path)
    }

    /// Identities of every image in order
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Config`] for an invalid prefix
    pub fn identities(&self) -> VerificarResult<Vec<ComparisonIdentity>> {
        (1..=self.total_images).map(|i| self.identity(i)).collect()
    }
}

/// Default series of the medical image viewer
#[must_use]
pub fn default_series() -> Vec<SeriesConfig> {
    vec![
        SeriesConfig::new("Series 1", "series_1", 7, "fixture/series1"),
        SeriesConfig::new("Series 2", "series_2", 6, "fixture/series2"),
    ]
}

/// Navigation timing and controls, consumed by page navigators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Pause after advancing to the next image
    pub after_next_ms: u64,
    /// Pause after switching to another series
    pub after_series_switch_ms: u64,
    /// Control that advances to the next image
    pub next_button: Selector,
    /// Test ID of a series button; `{n}` is replaced by the 1-based series number
    pub series_button_pattern: String,
    /// Surface attribute that changes once a series switch has landed
    pub series_change_attribute: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            after_next_ms: DEFAULT_AFTER_NEXT_MS,
            after_series_switch_ms: DEFAULT_AFTER_SERIES_SWITCH_MS,
            next_button: Selector::test_id("next-image-button"),
            series_button_pattern: "series-{n}-button".to_string(),
            series_change_attribute: "alt".to_string(),
        }
    }
}

impl NavigationConfig {
    /// Pause after next as Duration
    #[must_use]
    pub const fn after_next(&self) -> Duration {
        Duration::from_millis(self.after_next_ms)
    }

    /// Pause after a series switch as Duration
    #[must_use]
    pub const fn after_series_switch(&self) -> Duration {
        Duration::from_millis(self.after_series_switch_ms)
    }

    /// Selector of the button for the 1-based series `number`
    #[must_use]
    pub fn series_button(&self, number: usize) -> Selector {
        Selector::test_id(self.series_button_pattern.replace("{n}", &number.to_string()))
    }
}

/// Complete configuration of a verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificarConfig {
    /// Page under test (used by browser-driven runs)
    pub base_url: Option<String>,
    /// Surface under test
    pub surface: SurfaceConfig,
    /// Stabilization timing
    pub stability: StabilityOptions,
    /// Pixel comparison policy
    pub comparison: ComparisonConfig,
    /// File layout
    pub paths: PathsConfig,
    /// Navigation timing and controls
    pub navigation: NavigationConfig,
    /// Series to verify, in order
    pub series: Vec<SeriesConfig>,
}

impl Default for VerificarConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            surface: SurfaceConfig::default(),
            stability: StabilityOptions::default(),
            comparison: ComparisonConfig::default(),
            paths: PathsConfig::default(),
            navigation: NavigationConfig::default(),
            series: default_series(),
        }
    }
}

impl VerificarConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML and validate
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or the values are invalid
    pub fn from_yaml(yaml: &str) -> VerificarResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file and validate
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> VerificarResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> VerificarResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set the page under test
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.output_dir = dir.into();
        self
    }

    /// Set the tolerated mismatched pixel count
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: u64) -> Self {
        self.comparison.tolerance = tolerance;
        self
    }

    /// Set the per-pixel threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u8) -> Self {
        self.comparison.threshold = threshold;
        self
    }

    /// Replace the series list
    #[must_use]
    pub fn with_series(mut self, series: Vec<SeriesConfig>) -> Self {
        self.series = series;
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::Config`] describing the first invalid value
    pub fn validate(&self) -> VerificarResult<()> {
        if self.series.is_empty() {
            return Err(VerificarError::config("at least one series is required"));
        }
        for series in &self.series {
            if series.fixture_prefix.is_empty() {
                return Err(VerificarError::config(format!(
                    "series {:?} has an empty fixture_prefix",
                    series.name
                )));
            }
            if series.total_images == 0 {
                return Err(VerificarError::config(format!(
                    "series {:?} must have at least one image",
                    series.name
                )));
            }
        }
        if !(1..=100).contains(&self.comparison.jpeg_quality) {
            return Err(VerificarError::config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.comparison.jpeg_quality
            )));
        }
        if self.stability.retry.max_attempts == 0 {
            return Err(VerificarError::config("retry.max_attempts must be at least 1"));
        }
        if self.surface.content_attribute.is_empty() {
            return Err(VerificarError::config("surface.content_attribute must not be empty"));
        }
        if self.paths.fixture_extension.is_empty() || self.paths.artifact_extension.is_empty() {
            return Err(VerificarError::config("file extensions must not be empty"));
        }
        Ok(())
    }

    /// Fetch timeout as Duration
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.comparison.fetch_timeout_ms)
    }

    /// Comparator settings derived from this configuration
    #[must_use]
    pub fn to_comparator_config(&self) -> ComparatorConfig {
        let mut config = ComparatorConfig::new()
            .with_stability(self.stability)
            .with_tolerance(self.comparison.tolerance)
            .with_jpeg_quality(self.comparison.jpeg_quality)
            .with_output_dir(&self.paths.output_dir)
            .with_fixture_extension(&self.paths.fixture_extension)
            .with_fetch_timeout(self.comparison.fetch_timeout_ms);
        config.diff = DiffConfig::exact().with_threshold(self.comparison.threshold);
        config.artifact_extension = self.paths.artifact_extension.clone();
        config.base_url = self.base_url.clone();
        config
    }
}
