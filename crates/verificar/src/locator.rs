//! Surface handles and selectors.
//!
//! A [`SurfaceHandle`] names the live image element under test and the attribute
//! whose value identifies the bitmap currently shown (its content identifier).
//! Handles are read-only: nothing in this crate mutates the observed surface.

use serde::{Deserialize, Serialize};

/// Default attribute carrying the content identifier
pub const DEFAULT_CONTENT_ATTRIBUTE: &str = "src";

/// Selector type for locating the surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., `img.viewer`)
    Css(String),
    /// Test ID selector (`data-testid` attribute)
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Equivalent CSS selector string
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Css(s) => s.clone(),
            Self::TestId(id) => format!("[data-testid={id:?}]"),
        }
    }

    /// JavaScript expression evaluating to the matched element (or `null`)
    #[must_use]
    pub fn to_query(&self) -> String {
        let quoted = serde_json::to_string(&self.to_css()).unwrap_or_else(|_| "\"\"".to_string());
        format!("document.querySelector({quoted})")
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Opaque reference to the live surface under test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle {
    /// How the surface is located
    pub selector: Selector,
    /// Attribute whose value changes whenever the bitmap changes
    pub content_attribute: String,
}

impl SurfaceHandle {
    /// Create a handle reading the default `src` attribute
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            content_attribute: DEFAULT_CONTENT_ATTRIBUTE.to_string(),
        }
    }

    /// Handle for an element with the given `data-testid`
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(Selector::test_id(id))
    }

    /// Handle for a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// Use a different content identifier attribute
    #[must_use]
    pub fn with_content_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.content_attribute = attribute.into();
        self
    }
}

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.selector, self.content_attribute)
    }
}
