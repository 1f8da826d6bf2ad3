//! Diagnostic artifacts.
//!
//! Every comparison writes, best-effort, into the output directory:
//!
//! - `rendered_{prefix}_{index}.{ext}`: the capture exactly as fetched
//! - `diff_{prefix}_{index}.{ext}`: JPEG visualization of per-pixel differences
//!
//! Names derive only from the comparison identity, so concurrent comparisons of
//! different identities never collide. Write failures are logged and collected
//! in an [`ArtifactReport`]; they never change a verdict.

use crate::file_ops::FileStore;
use crate::result::VerificarResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default artifact extension
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "jpg";

/// Kind of diagnostic artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Raw rendered capture
    Rendered,
    /// Diff visualization
    Diff,
}

impl ArtifactKind {
    /// File name prefix
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::Diff => "diff",
        }
    }
}

/// Deterministic artifact locations for one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Directory holding the artifacts
    pub output_dir: PathBuf,
    /// Path of the raw rendered capture
    pub rendered: PathBuf,
    /// Path of the diff visualization
    pub diff: PathBuf,
}

impl ArtifactPaths {
    /// Paths for `{stem}` (e.g. `series_1_3`) inside `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, stem: &str, extension: &str) -> Self {
        let output_dir = output_dir.into();
        let name = |kind: ArtifactKind| output_dir.join(format!("{}_{stem}.{extension}", kind.prefix()));
        Self {
            rendered: name(ArtifactKind::Rendered),
            diff: name(ArtifactKind::Diff),
            output_dir,
        }
    }

    /// Path for the given artifact kind
    #[must_use]
    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Rendered => &self.rendered,
            ArtifactKind::Diff => &self.diff,
        }
    }
}

/// A failed artifact write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFailure {
    /// Artifact that was not written (`None` for the output directory itself)
    pub kind: Option<ArtifactKind>,
    /// Target path
    pub path: PathBuf,
    /// Error message
    pub message: String,
}

/// What was and was not persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    /// Files written
    pub written: Vec<PathBuf>,
    /// Writes that failed
    pub failures: Vec<ArtifactFailure>,
}

impl ArtifactReport {
    /// Whether every attempted write succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether `kind` was written
    #[must_use]
    pub fn contains(&self, paths: &ArtifactPaths, kind: ArtifactKind) -> bool {
        self.written.iter().any(|p| p == paths.path(kind))
    }
}

/// Best-effort writer of comparison artifacts
#[derive(Debug)]
pub struct ArtifactWriter<'a, F: ?Sized> {
    store: &'a F,
    paths: ArtifactPaths,
    report: ArtifactReport,
    directory_ready: Option<bool>,
}

impl<'a, F: FileStore + ?Sized> ArtifactWriter<'a, F> {
    /// Writer targeting `paths` through `store`
    #[must_use]
    pub const fn new(store: &'a F, paths: ArtifactPaths) -> Self {
        Self {
            store,
            paths,
            report: ArtifactReport {
                written: Vec::new(),
                failures: Vec::new(),
            },
            directory_ready: None,
        }
    }

    /// Target paths
    #[must_use]
    pub const fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Write one artifact; failures are recorded, not returned
    pub async fn write(&mut self, kind: ArtifactKind, bytes: &[u8]) {
        if !self.ensure_directory().await {
            return;
        }
        let path = self.paths.path(kind).to_path_buf();
        match self.store.write_bytes(&path, bytes).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
                self.report.written.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write artifact");
                self.report.failures.push(ArtifactFailure {
                    kind: Some(kind),
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Write an artifact whose bytes may have failed to encode
    pub async fn write_encoded(&mut self, kind: ArtifactKind, encoded: VerificarResult<Vec<u8>>) {
        match encoded {
            Ok(bytes) => self.write(kind, &bytes).await,
            Err(e) => {
                let path = self.paths.path(kind).to_path_buf();
                warn!(path = %path.display(), error = %e, "failed to encode artifact");
                self.report.failures.push(ArtifactFailure {
                    kind: Some(kind),
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Finish and return the report
    #[must_use]
    pub fn finish(self) -> ArtifactReport {
        self.report
    }

    async fn ensure_directory(&mut self) -> bool {
        if let Some(ready) = self.directory_ready {
            return ready;
        }
        let ready = match self.store.ensure_directory(&self.paths.output_dir).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    dir = %self.paths.output_dir.display(),
                    error = %e,
                    "failed to create artifact directory"
                );
                self.report.failures.push(ArtifactFailure {
                    kind: None,
                    path: self.paths.output_dir.clone(),
                    message: e.to_string(),
                });
                false
            }
        };
        self.directory_ready = Some(ready);
        ready
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::file_ops::{LocalFileStore, MemoryFileStore};
    use crate::result::VerificarError;

    #[test]
    fn test_paths_follow_naming_convention() {
        let paths = ArtifactPaths::new("output", "series_1_3", "jpg");
        assert_eq!(paths.rendered, PathBuf::from("output/rendered_series_1_3.jpg"));
        assert_eq!(paths.diff, PathBuf::from("output/diff_series_1_3.jpg"));
        assert_eq!(paths.path(ArtifactKind::Diff), Path::new("output/diff_series_1_3.jpg"));
    }

    #[tokio::test]
    async fn test_writer_creates_directory_and_files() {
        let store = MemoryFileStore::new();
        let paths = ArtifactPaths::new("out", "series_2_1", "jpg");
        let mut writer = ArtifactWriter::new(&store, paths.clone());
        writer.write(ArtifactKind::Rendered, &[1, 2, 3]).await;
        writer.write(ArtifactKind::Diff, &[4]).await;
        let report = writer.finish();

        assert!(report.is_complete());
        assert!(report.contains(&paths, ArtifactKind::Rendered));
        assert!(report.contains(&paths, ArtifactKind::Diff));
        assert!(store.has_directory(Path::new("out")));
        assert_eq!(store.get(&paths.rendered), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_read_only_store_records_failures() {
        let store = MemoryFileStore::new().read_only();
        let paths = ArtifactPaths::new("out", "series_1_1", "jpg");
        let mut writer = ArtifactWriter::new(&store, paths);
        writer.write(ArtifactKind::Rendered, &[1]).await;
        writer.write(ArtifactKind::Diff, &[1]).await;
        let report = writer.finish();

        assert!(report.written.is_empty());
        // directory failure is recorded once; writes are skipped afterwards
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, None);
    }

    #[tokio::test]
    async fn test_encode_failure_is_recorded() {
        let store = MemoryFileStore::new();
        let paths = ArtifactPaths::new("out", "x_1", "jpg");
        let mut writer = ArtifactWriter::new(&store, paths);
        writer
            .write_encoded(
                ArtifactKind::Diff,
                Err(VerificarError::Encode {
                    message: "boom".to_string(),
                }),
            )
            .await;
        let report = writer.finish();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, Some(ArtifactKind::Diff));
    }

    #[tokio::test]
    async fn test_local_store_writes_nested_directory() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().join("a").join("b");
        let paths = ArtifactPaths::new(&out, "series_1_7", "jpg");
        let store = LocalFileStore::new();
        let mut writer = ArtifactWriter::new(&store, paths.clone());
        writer.write(ArtifactKind::Rendered, b"jpeg").await;
        assert!(writer.finish().is_complete());
        assert_eq!(std::fs::read(&paths.rendered).unwrap(), b"jpeg");
    }
}
