//! Typed errors for the aggregator library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! blocked board from a timeout from a browser that never started.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching raw markup for one page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    /// Transport-level failure (DNS, TLS, connection reset, body read)
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The call did not finish inside its budget
    #[error("timed out after {after:?} fetching {url}")]
    Timeout { url: String, after: Duration },

    /// Board answered with an anti-bot or rate-limit page
    #[error("blocked by {url}")]
    Blocked { url: String },

    /// Rendering proxy rejected the request or returned no content
    #[error("render proxy error: {0}")]
    Proxy(String),

    /// Headless browser failed to launch, navigate or render
    #[error("browser error: {0}")]
    Browser(String),

    /// Search URL could not be built or parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Upstream cancellation (client disconnect or request deadline)
    #[error("operation cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn network(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Network(Box::new(err))
    }

    /// Whether the board is refusing us, as opposed to being broken.
    ///
    /// Only blocking errors are worth retrying through the render proxy.
    pub fn is_blocking(&self) -> bool {
        match self {
            Self::Blocked { .. } => true,
            Self::Http { status, .. } => matches!(status, 403 | 429 | 503),
            _ => false,
        }
    }
}

/// Why a single adapter call produced no records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page {page}: {reason}")]
pub struct AdapterFailure {
    pub page: u32,
    pub reason: String,
}

impl AdapterFailure {
    pub fn new(page: u32, reason: impl Into<String>) -> Self {
        Self {
            page,
            reason: reason.into(),
        }
    }
}

/// Errors that abort a whole aggregation request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The shared automation resource could not be acquired
    #[error("browser session unavailable: {0}")]
    SessionUnavailable(#[source] FetchError),

    /// Request rejected before any board was contacted
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

/// Board configuration that cannot be compiled into an extractor.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid search URL for {board}: {url}")]
    InvalidSearchUrl { board: String, url: String },

    #[error("invalid board {board}: {reason}")]
    InvalidBoard { board: String, reason: String },

    #[error("duplicate board id: {0}")]
    DuplicateBoard(String),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blocking() {
        let forbidden = FetchError::Http {
            status: 403,
            url: "https://example.com".into(),
        };
        assert!(forbidden.is_blocking());

        let blocked = FetchError::Blocked {
            url: "https://example.com".into(),
        };
        assert!(blocked.is_blocking());

        let server_error = FetchError::Http {
            status: 500,
            url: "https://example.com".into(),
        };
        assert!(!server_error.is_blocking());
        assert!(!FetchError::Cancelled.is_blocking());
    }

    #[test]
    fn test_adapter_failure_display() {
        let failure = AdapterFailure::new(2, "timed out");
        assert_eq!(failure.to_string(), "page 2: timed out");
    }
}
