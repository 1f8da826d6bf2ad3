//! SurfaceDriver - Abstract Browser Collaborator
//!
//! The comparison core never talks to a browser directly. Everything it needs
//! from the page is behind [`SurfaceDriver`]:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  SurfaceDriver (trait)                                        │
//! ├───────────────────────────────────────────────────────────────┤
//! │  is_visible(handle)            -> bool                        │
//! │  get_attribute(handle, name)   -> Option<String>              │
//! │  wait_for_network_idle(budget) -> ()                          │
//! │  fetch_bytes(url)              -> FetchResponse               │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ChromiumSurfaceDriver (feature `browser`)  │  MockDriver      │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use crate::locator::{Selector, SurfaceHandle};
use crate::result::{VerificarError, VerificarResult};
use async_trait::async_trait;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Bytes returned by a fetch, with the transport status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A 200 response with the given body
    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// A 404 response
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: b"Not Found".to_vec(),
        }
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Return the body, rejecting non-2xx statuses and empty bodies
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::FetchFailed`] naming `url`
    pub fn into_body(self, url: &str) -> VerificarResult<Vec<u8>> {
        if !self.is_success() {
            return Err(VerificarError::fetch(
                url,
                Some(self.status),
                format!("status {}", self.status),
            ));
        }
        if self.body.is_empty() {
            return Err(VerificarError::fetch(url, Some(self.status), "empty body"));
        }
        Ok(self.body)
    }
}

/// Browser-side operations the comparison core consumes
#[async_trait]
pub trait SurfaceDriver: Send + Sync {
    /// Whether the surface is currently rendered and visible
    async fn is_visible(&self, handle: &SurfaceHandle) -> VerificarResult<bool>;

    /// Read an attribute of the surface (`None` if absent)
    async fn get_attribute(
        &self,
        handle: &SurfaceHandle,
        name: &str,
    ) -> VerificarResult<Option<String>>;

    /// Block until the page has no outstanding network activity
    async fn wait_for_network_idle(&self, timeout: Duration) -> VerificarResult<()>;

    /// Fetch a resource by absolute URL
    async fn fetch_bytes(&self, url: &str) -> VerificarResult<FetchResponse>;
}

/// Drivers that can also operate the viewer's controls
#[async_trait]
pub trait ViewerControls: SurfaceDriver {
    /// Click the first element matching `selector`
    async fn click(&self, selector: &Selector) -> VerificarResult<()>;
}

/// Turn a content identifier into an absolute, fetchable URL
///
/// Absolute identifiers (including `data:` URLs) are returned unchanged; relative
/// ones are joined onto `base`.
///
/// # Errors
///
/// Returns [`VerificarError::FetchFailed`] for a relative identifier without a
/// usable base URL
pub fn resolve_content_url(base: Option<&str>, content_id: &str) -> VerificarResult<String> {
    if let Ok(absolute) = url::Url::parse(content_id) {
        return Ok(absolute.to_string());
    }

    let Some(base) = base else {
        return Err(VerificarError::fetch(
            content_id,
            None,
            "relative content identifier and no base URL configured",
        ));
    };

    url::Url::parse(base)
        .and_then(|b| b.join(content_id))
        .map(|u| u.to_string())
        .map_err(|e| {
            VerificarError::fetch(
                content_id,
                None,
                format!("cannot resolve against {base}: {e}"),
            )
        })
}

/// Decode a `data:` URL in place
///
/// Returns `Ok(None)` if `url` is not a data URL.
///
/// # Errors
///
/// Returns [`VerificarError::FetchFailed`] for malformed data URLs
pub fn decode_data_url(url: &str) -> VerificarResult<Option<FetchResponse>> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(None);
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return Err(VerificarError::fetch(url, None, "data URL has no payload"));
    };

    let body = if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| VerificarError::fetch(url, None, format!("invalid base64: {e}")))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(Some(FetchResponse::ok(body)))
}

/// HTTP client used to download rendered images
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> VerificarResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerificarError::driver(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url`, or decode it locally if it is a `data:` URL
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::FetchFailed`] on transport errors and timeouts
    pub async fn fetch(&self, url: &str) -> VerificarResult<FetchResponse> {
        if let Some(inline) = decode_data_url(url)? {
            return Ok(inline);
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                e.to_string()
            };
            VerificarError::fetch(url, None, message)
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| VerificarError::fetch(url, Some(status), e.to_string()))?;

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Scripted visibility of a mock surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockVisibility {
    /// Always visible
    Visible,
    /// Never visible
    Hidden,
    /// Becomes visible once this much time has passed since creation
    VisibleAfter(Duration),
}

/// Scripted content identifier of a mock surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockContent {
    /// Identifier never changes
    Static(String),
    /// Attribute is absent
    Missing,
    /// Identifier changes every `period` (`{prefix}?v={tick}`)
    Changing {
        /// Identifier prefix
        prefix: String,
        /// Time between changes
        period: Duration,
    },
    /// Like `Changing`, but freezes on the last identifier once `until` has passed
    Settling {
        /// Identifier prefix
        prefix: String,
        /// Time between changes
        period: Duration,
        /// Time after creation at which changes stop
        until: Duration,
    },
}

/// Mock driver for unit testing
#[derive(Debug)]
pub struct MockDriver {
    visibility: MockVisibility,
    content: MockContent,
    resources: HashMap<String, FetchResponse>,
    network_idle_failure: Option<String>,
    created: Instant,
    call_history: Mutex<Vec<String>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Visible surface with no content and no resources
    #[must_use]
    pub fn new() -> Self {
        Self {
            visibility: MockVisibility::Visible,
            content: MockContent::Missing,
            resources: HashMap::new(),
            network_idle_failure: None,
            created: Instant::now(),
            call_history: Mutex::new(Vec::new()),
        }
    }

    /// Static surface showing `url`, which serves `body`
    #[must_use]
    pub fn serving(url: impl Into<String>, body: Vec<u8>) -> Self {
        let url = url.into();
        Self::new()
            .with_content(MockContent::Static(url.clone()))
            .with_resource(url, body)
    }

    /// Set visibility script
    #[must_use]
    pub fn with_visibility(mut self, visibility: MockVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set content identifier script
    #[must_use]
    pub fn with_content(mut self, content: MockContent) -> Self {
        self.content = content;
        self
    }

    /// Serve `body` with status 200 at `url`
    #[must_use]
    pub fn with_resource(self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.with_response(url, FetchResponse::ok(body))
    }

    /// Serve an arbitrary response at `url`
    #[must_use]
    pub fn with_response(mut self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.resources.insert(url.into(), response);
        self
    }

    /// Make `wait_for_network_idle` fail
    #[must_use]
    pub fn with_network_idle_failure(mut self, message: impl Into<String>) -> Self {
        self.network_idle_failure = Some(message.into());
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.history().iter().filter(|c| c.starts_with(method)).count()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    fn record(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }

    fn current_content(&self) -> Option<String> {
        match &self.content {
            MockContent::Static(id) => Some(id.clone()),
            MockContent::Missing => None,
            MockContent::Changing { prefix, period } => {
                let period_ms = period.as_millis().max(1);
                let tick = self.created.elapsed().as_millis() / period_ms;
                Some(format!("{prefix}?v={tick}"))
            }
            MockContent::Settling {
                prefix,
                period,
                until,
            } => {
                let period_ms = period.as_millis().max(1);
                let elapsed = self.created.elapsed().min(*until);
                Some(format!("{prefix}?v={}", elapsed.as_millis() / period_ms))
            }
        }
    }
}

#[async_trait]
impl SurfaceDriver for MockDriver {
    async fn is_visible(&self, handle: &SurfaceHandle) -> VerificarResult<bool> {
        self.record(format!("is_visible:{}", handle.selector));
        Ok(match self.visibility {
            MockVisibility::Visible => true,
            MockVisibility::Hidden => false,
            MockVisibility::VisibleAfter(delay) => self.created.elapsed() >= delay,
        })
    }

    async fn get_attribute(
        &self,
        handle: &SurfaceHandle,
        name: &str,
    ) -> VerificarResult<Option<String>> {
        self.record(format!("get_attribute:{}:{name}", handle.selector));
        if name == handle.content_attribute {
            Ok(self.current_content())
        } else {
            Ok(None)
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> VerificarResult<()> {
        self.record(format!("wait_for_network_idle:{}", timeout.as_millis()));
        match &self.network_idle_failure {
            Some(message) => Err(VerificarError::driver(message.clone())),
            None => Ok(()),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> VerificarResult<FetchResponse> {
        self.record(format!("fetch_bytes:{url}"));
        if let Some(inline) = decode_data_url(url)? {
            return Ok(inline);
        }
        Ok(self
            .resources
            .get(url)
            .cloned()
            .unwrap_or_else(FetchResponse::not_found))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod fetch_response_tests {
        use super::*;

        #[test]
        fn test_success_range() {
            assert!(FetchResponse::ok(vec![1]).is_success());
            assert!(!FetchResponse::not_found().is_success());
            assert!(!FetchResponse { status: 302, body: vec![1] }.is_success());
        }

        #[test]
        fn test_into_body_rejects_status() {
            let err = FetchResponse::not_found().into_body("http://x/a.jpg").unwrap_err();
            match err {
                VerificarError::FetchFailed { url, status, .. } => {
                    assert_eq!(url, "http://x/a.jpg");
                    assert_eq!(status, Some(404));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_into_body_rejects_empty() {
            let err = FetchResponse::ok(vec![]).into_body("http://x/a.jpg").unwrap_err();
            assert!(err.to_string().contains("empty body"));
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_absolute_identifier_unchanged() {
            let url = resolve_content_url(None, "https://cdn.example.com/img/1.jpeg").unwrap();
            assert_eq!(url, "https://cdn.example.com/img/1.jpeg");
        }

        #[test]
        fn test_relative_identifier_joined() {
            let url =
                resolve_content_url(Some("https://viewer.example.com/app/"), "/images/s1/3.jpeg")
                    .unwrap();
            assert_eq!(url, "https://viewer.example.com/images/s1/3.jpeg");
        }

        #[test]
        fn test_relative_identifier_without_base() {
            let err = resolve_content_url(None, "/images/3.jpeg").unwrap_err();
            assert!(matches!(err, VerificarError::FetchFailed { .. }));
        }

        #[test]
        fn test_data_url_base64() {
            let resp = decode_data_url("data:image/png;base64,AQID").unwrap().unwrap();
            assert_eq!(resp.body, vec![1, 2, 3]);
            assert_eq!(resp.status, 200);
        }

        #[test]
        fn test_non_data_url() {
            assert!(decode_data_url("https://example.com/a.png").unwrap().is_none());
        }

        #[test]
        fn test_malformed_data_url() {
            assert!(decode_data_url("data:image/png;base64").is_err());
            assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        }
    }

    mod mock_driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_static_content() {
            let driver = MockDriver::serving("http://x/1.jpg", vec![1, 2]);
            let handle = SurfaceHandle::test_id("medical-image");
            assert!(driver.is_visible(&handle).await.unwrap());
            assert_eq!(
                driver.get_attribute(&handle, "src").await.unwrap(),
                Some("http://x/1.jpg".to_string())
            );
            assert_eq!(driver.get_attribute(&handle, "alt").await.unwrap(), None);
            assert_eq!(
                driver.fetch_bytes("http://x/1.jpg").await.unwrap().body,
                vec![1, 2]
            );
            assert_eq!(driver.fetch_bytes("http://x/2.jpg").await.unwrap().status, 404);
            assert!(driver.was_called("fetch_bytes"));
            assert_eq!(driver.call_count("get_attribute"), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_changing_content_ticks() {
            let driver = MockDriver::new().with_content(MockContent::Changing {
                prefix: "http://x/frame".to_string(),
                period: Duration::from_millis(100),
            });
            let handle = SurfaceHandle::css("img");
            let first = driver.get_attribute(&handle, "src").await.unwrap();
            tokio::time::sleep(Duration::from_millis(250)).await;
            let second = driver.get_attribute(&handle, "src").await.unwrap();
            assert_eq!(first.as_deref(), Some("http://x/frame?v=0"));
            assert_eq!(second.as_deref(), Some("http://x/frame?v=2"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_visible_after_delay() {
            let driver =
                MockDriver::new().with_visibility(MockVisibility::VisibleAfter(Duration::from_secs(1)));
            let handle = SurfaceHandle::css("img");
            assert!(!driver.is_visible(&handle).await.unwrap());
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(driver.is_visible(&handle).await.unwrap());
        }

        #[tokio::test]
        async fn test_network_idle_failure() {
            let driver = MockDriver::new().with_network_idle_failure("page crashed");
            let err = driver
                .wait_for_network_idle(Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("page crashed"));
        }
    }
}
