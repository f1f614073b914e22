//! Fetch capability and its decorators

use crate::context::InterceptionContext;
use crate::error::FetchError;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;
use warden_store::InterceptionPoint;

/// Request object form of a fetch argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target URL
    pub url: String,
    /// HTTP method
    pub method: String,
}

impl Request {
    /// GET request for `url`
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
        }
    }
}

/// Fetch argument: a bare URL or a request object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchInput {
    /// `fetch("https://...")`
    Url(String),
    /// `fetch(new Request(...))`
    Request(Request),
}

impl FetchInput {
    /// Target URL regardless of argument style
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Request(request) => &request.url,
        }
    }
}

impl From<&str> for FetchInput {
    fn from(value: &str) -> Self {
        Self::Url(value.to_string())
    }
}

impl From<String> for FetchInput {
    fn from(value: String) -> Self {
        Self::Url(value)
    }
}

impl From<Request> for FetchInput {
    fn from(value: Request) -> Self {
        Self::Request(value)
    }
}

/// Response returned by a fetch capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response answers
    pub url: String,
    /// HTTP status
    pub status: u16,
    /// `Content-Type` header value
    pub content_type: String,
    /// Body text
    pub body: String,
    /// Whether Warden produced this response without network I/O
    pub synthetic: bool,
}

impl Response {
    /// Successful network response
    #[must_use]
    pub fn ok(url: impl Into<String>, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
            synthetic: false,
        }
    }

    /// Whether status is 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network fetch primitive
#[async_trait::async_trait]
pub trait Fetch: Send + Sync + Debug {
    /// Perform a request
    async fn fetch(&self, input: FetchInput) -> Result<Response, FetchError>;
}

/// Page fetch that always goes through the registry's current transport
///
/// Reads the transport slot on every call so a background proxy installed
/// later still sees requests from code that captured this fetch early.
#[derive(Debug, Clone)]
pub struct TransportFetch {
    slot: Arc<RwLock<Arc<dyn Fetch>>>,
}

impl TransportFetch {
    pub(crate) fn new(slot: Arc<RwLock<Arc<dyn Fetch>>>) -> Self {
        Self { slot }
    }
}

#[async_trait::async_trait]
impl Fetch for TransportFetch {
    async fn fetch(&self, input: FetchInput) -> Result<Response, FetchError> {
        let transport = self.slot.read().clone();
        transport.fetch(input).await
    }
}

/// Capture point 2: page-level fetch override
#[derive(Debug)]
pub struct GuardedFetch {
    inner: Arc<dyn Fetch>,
    context: Arc<InterceptionContext>,
}

impl GuardedFetch {
    /// Wrap the real fetch
    #[must_use]
    pub fn new(inner: Arc<dyn Fetch>, context: Arc<InterceptionContext>) -> Self {
        Self { inner, context }
    }
}

#[async_trait::async_trait]
impl Fetch for GuardedFetch {
    async fn fetch(&self, input: FetchInput) -> Result<Response, FetchError> {
        let url = input.url();
        let stub = self.context.stub();
        if stub.serves(url) {
            return Ok(stub.response(url));
        }
        if let Some(sub) = self.context.evaluate(url, InterceptionPoint::Fetch) {
            return Ok(stub.response(&sub.url));
        }
        self.inner.fetch(input).await
    }
}
