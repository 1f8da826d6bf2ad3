//! Reporter - Verdict Aggregation
//!
//! Collects per-image verdicts into per-series and per-run reports that can be
//! printed as a human summary or written as JSON for CI tooling.
//!
//! ```text
//!   Verdict ──► VerdictRecord ──► SeriesReport ──► RunReport ──► JSON / text
//! ```
//!
//! Two failure modes are supported:
//!
//! - [`FailureMode::FailFast`]: stop the run on the first failed image
//! - [`FailureMode::CollectAll`]: verify every image and report all failures

use crate::comparator::Verdict;
use crate::result::{ErrorKind, VerificarResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do after a failed image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop on first failure
    #[default]
    FailFast,
    /// Verify everything, then report
    CollectAll,
}

/// Serializable summary of one [`Verdict`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    /// `{series_prefix}_{image_index}`
    pub identity: String,
    /// Series prefix
    pub series_prefix: String,
    /// 1-based image index
    pub image_index: u32,
    /// Whether the comparison passed
    pub passed: bool,
    /// Mismatched pixels, when the pixel scan ran
    pub mismatched_pixel_count: Option<u64>,
    /// Pixels compared, when the pixel scan ran
    pub total_pixels: Option<u64>,
    /// Failure classification
    pub error_kind: Option<ErrorKind>,
    /// Failure message
    pub message: Option<String>,
    /// Content identifier that was compared
    pub content_id: Option<String>,
    /// Artifacts written
    pub artifacts: Vec<PathBuf>,
    /// Artifact writes that failed
    pub artifact_failures: Vec<String>,
    /// Wall time of the comparison
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl VerdictRecord {
    /// Summarize `verdict`, which took `duration`
    #[must_use]
    pub fn from_verdict(verdict: &Verdict, duration: Duration) -> Self {
        Self {
            identity: verdict.identity.stem(),
            series_prefix: verdict.identity.series_prefix.clone(),
            image_index: verdict.identity.image_index,
            passed: verdict.passed,
            mismatched_pixel_count: verdict.mismatched_pixel_count(),
            total_pixels: verdict.diff.as_ref().map(|d| d.total_pixels),
            error_kind: verdict.error_kind(),
            message: verdict.error.as_ref().map(ToString::to_string),
            content_id: verdict
                .stability
                .as_ref()
                .map(|s| s.final_content_id.clone()),
            artifacts: verdict.artifacts.written.clone(),
            artifact_failures: verdict
                .artifacts
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.path.display(), f.message))
                .collect(),
            duration,
        }
    }

    /// One line for the text summary
    #[must_use]
    pub fn line(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        match (&self.message, self.mismatched_pixel_count) {
            (Some(message), _) => format!("{status} {} - {message}", self.identity),
            (None, Some(count)) => format!("{status} {} ({count} mismatched)", self.identity),
            (None, None) => format!("{status} {}", self.identity),
        }
    }
}

/// Results of one series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesReport {
    /// Series display name
    pub name: String,
    /// Series prefix
    pub fixture_prefix: String,
    /// Images the series declares
    pub total_images: u32,
    /// One record per verified image
    pub results: Vec<VerdictRecord>,
    /// Navigation failure that ended the series early
    pub navigation_error: Option<String>,
}

impl SeriesReport {
    /// Empty report for a series
    #[must_use]
    pub fn new(name: impl Into<String>, fixture_prefix: impl Into<String>, total_images: u32) -> Self {
        Self {
            name: name.into(),
            fixture_prefix: fixture_prefix.into(),
            total_images,
            results: Vec::new(),
            navigation_error: None,
        }
    }

    /// Number of passed images
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Number of failed images
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Every declared image was verified and passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.navigation_error.is_none()
            && self.failed_count() == 0
            && self.results.len() == self.total_images as usize
    }

    /// Failed records
    #[must_use]
    pub fn failures(&self) -> Vec<&VerdictRecord> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Results of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure mode in effect
    pub failure_mode: FailureMode,
    /// Whether the run stopped before verifying every series
    pub stopped_early: bool,
    /// One report per series, in run order
    pub series: Vec<SeriesReport>,
}

impl RunReport {
    /// Start a run now
    #[must_use]
    pub fn start(failure_mode: FailureMode) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            failure_mode,
            stopped_early: false,
            series: Vec::new(),
        }
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Verified images across all series
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.series.iter().map(|s| s.results.len()).sum()
    }

    /// Passed images across all series
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.series.iter().map(SeriesReport::passed_count).sum()
    }

    /// Failed images across all series
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.series.iter().map(SeriesReport::failed_count).sum()
    }

    /// Every series fully verified and passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.stopped_early && self.series.iter().all(SeriesReport::all_passed)
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}/{} images passed across {} series{}",
            self.passed_count(),
            self.total_count(),
            self.series.len(),
            if self.stopped_early { " (stopped early)" } else { "" }
        )
    }

    /// Multi-line human report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for series in &self.series {
            let _ = writeln!(
                out,
                "{} [{}]: {}/{} passed",
                series.name,
                series.fixture_prefix,
                series.passed_count(),
                series.total_images
            );
            for record in &series.results {
                let _ = writeln!(out, "  {}", record.line());
            }
            if let Some(err) = &series.navigation_error {
                let _ = writeln!(out, "  navigation failed: {err}");
            }
        }
        out.push_str(&self.summary());
        out.push('\n');
        out
    }

    /// Pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> VerificarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`
    ///
    /// # Errors
    ///
    /// Returns error if serialization or writing fails
    pub fn write_json(&self, path: &Path) -> VerificarResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
