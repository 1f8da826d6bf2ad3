//! Result and error types for Verificar.
//!
//! Every comparison failure is terminal for the call that produced it and carries
//! enough context (identity, path, dimensions, counts) to diagnose it without
//! re-running the comparison.

use crate::image_data::Geometry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Verificar operations
pub type VerificarResult<T> = Result<T, VerificarError>;

/// Which of the two compared buffers an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSide {
    /// The image captured from the live surface
    Rendered,
    /// The stored reference image
    Fixture,
}

impl ImageSide {
    /// Lowercase label used in messages and artifact names
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::Fixture => "fixture",
        }
    }
}

impl std::fmt::Display for ImageSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable, serializable classification of a [`VerificarError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Surface never became visible
    NotVisible,
    /// Content identifier changed during the settle window
    Unstable,
    /// Surface has no content identifier to sample
    MissingContentId,
    /// Rendered artifact could not be fetched
    FetchFailed,
    /// Reference image is absent
    FixtureNotFound,
    /// A buffer failed to decode
    DecodeError,
    /// Dimensions or channel count differ
    GeometryMismatch,
    /// Too many pixels differ
    PixelMismatch,
    /// Driver-level failure (browser, network readiness)
    Driver,
    /// Operation timed out
    Timeout,
    /// Configuration is invalid
    Config,
    /// Anything else (I/O, encoding, serialization)
    Internal,
}

impl ErrorKind {
    /// snake_case name, matching the serialized form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotVisible => "not_visible",
            Self::Unstable => "unstable",
            Self::MissingContentId => "missing_content_id",
            Self::FetchFailed => "fetch_failed",
            Self::FixtureNotFound => "fixture_not_found",
            Self::DecodeError => "decode_error",
            Self::GeometryMismatch => "geometry_mismatch",
            Self::PixelMismatch => "pixel_mismatch",
            Self::Driver => "driver",
            Self::Timeout => "timeout",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in Verificar
#[derive(Debug, Error)]
pub enum VerificarError {
    /// Surface did not become visible within the wait budget
    #[error("Surface {selector} not visible after {timeout_ms}ms")]
    NotVisible {
        /// Selector of the surface
        selector: String,
        /// Visibility budget in milliseconds
        timeout_ms: u64,
    },

    /// Content identifier changed across the settle window
    #[error(
        "Surface {selector} unstable: content changed from {before:?} to {after:?} within {settle_ms}ms ({attempts} attempt(s))"
    )]
    Unstable {
        /// Selector of the surface
        selector: String,
        /// First sample
        before: String,
        /// Second sample
        after: String,
        /// Settle window in milliseconds
        settle_ms: u64,
        /// Number of sample pairs taken
        attempts: u32,
    },

    /// Surface exposes no content identifier attribute
    #[error("Surface {selector} has no {attribute:?} attribute")]
    MissingContentId {
        /// Selector of the surface
        selector: String,
        /// Attribute that was read
        attribute: String,
    },

    /// Transport error, non-success status or empty body
    #[error("Fetching {url} failed: {message}")]
    FetchFailed {
        /// Resolved URL
        url: String,
        /// HTTP status, when a response arrived
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Reference image is missing
    #[error("Fixture not found: {}", path.display())]
    FixtureNotFound {
        /// Resolved fixture path
        path: PathBuf,
    },

    /// A buffer could not be decoded as an image
    #[error("Failed to decode {side} image: {message}")]
    DecodeError {
        /// Which buffer failed
        side: ImageSide,
        /// Decoder message
        message: String,
    },

    /// Dimensions or channel count differ between rendered and fixture
    #[error("Image geometry differs: rendered {rendered}, fixture {fixture}")]
    GeometryMismatch {
        /// Rendered width x height x channels
        rendered: Geometry,
        /// Fixture width x height x channels
        fixture: Geometry,
    },

    /// Decode and geometry succeeded but too many pixels differ
    #[error("Image {identity} has {mismatched} mismatched pixels (tolerated: {tolerated})")]
    PixelMismatch {
        /// Comparison identity (`{series_prefix}_{image_index}`)
        identity: String,
        /// Mismatched pixel count
        mismatched: u64,
        /// Tolerated pixel count
        tolerated: u64,
    },

    /// Driver failure (browser, page, script evaluation)
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("{operation} timed out after {ms}ms")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Image encoding failed
    #[error("Image encoding failed: {message}")]
    Encode {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl VerificarError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a fetch error
    #[must_use]
    pub fn fetch(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a decode error for one side of the comparison
    #[must_use]
    pub fn decode(side: ImageSide, message: impl Into<String>) -> Self {
        Self::DecodeError {
            side,
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotVisible { .. } => ErrorKind::NotVisible,
            Self::Unstable { .. } => ErrorKind::Unstable,
            Self::MissingContentId { .. } => ErrorKind::MissingContentId,
            Self::FetchFailed { .. } => ErrorKind::FetchFailed,
            Self::FixtureNotFound { .. } => ErrorKind::FixtureNotFound,
            Self::DecodeError { .. } => ErrorKind::DecodeError,
            Self::GeometryMismatch { .. } => ErrorKind::GeometryMismatch,
            Self::PixelMismatch { .. } => ErrorKind::PixelMismatch,
            Self::Driver { .. } => ErrorKind::Driver,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Config { .. } => ErrorKind::Config,
            Self::Encode { .. } | Self::Io(_) | Self::Json(_) | Self::Yaml(_) => {
                ErrorKind::Internal
            }
        }
    }
}
