//! Error types for the interception layer

/// Errors returned by a fetch capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport failed
    #[error("network error: {0}")]
    Network(String),

    /// Background proxy stopped answering
    #[error("background proxy unavailable")]
    ProxyUnavailable,
}

/// Errors while installing one capture point
///
/// Never escalated: the layer logs them and keeps installing the others.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    /// No async runtime to host the background proxy
    #[error("no async runtime available for the background proxy")]
    NoRuntime,

    /// No document to observe
    #[error("no document available to observe")]
    DocumentUnavailable,

    /// Background proxy failed to start
    #[error("background proxy failed to start: {0}")]
    Proxy(String),
}

/// Errors talking to the background proxy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// Proxy worker has shut down
    #[error("background proxy disconnected")]
    Disconnected,
}

impl From<ProxyError> for FetchError {
    fn from(_: ProxyError) -> Self {
        Self::ProxyUnavailable
    }
}
