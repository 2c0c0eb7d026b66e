//! Fetching raw markup for one search-results page.
//!
//! Fetchers know nothing about job postings. They turn a URL into HTML and
//! leave extraction to [`crate::extract`], so either side can be swapped or
//! stubbed independently.
//!
//! # Available Fetchers
//!
//! - `HttpFetcher` - plain HTTP with browser-like headers
//! - `RenderProxyFetcher` - Firecrawl scrape API (JavaScript rendering, anti-bot)
//! - `FallbackFetcher` - primary fetcher, render proxy when blocked
//! - `RateLimitedFetcher` - governor quota in front of any fetcher
//! - `BrowserFetcher` - renders through the request's browser session

mod browser;
mod fallback;
mod http;
mod proxy;
mod rate_limited;

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::FetchResult;

pub use browser::BrowserFetcher;
pub use fallback::FallbackFetcher;
pub use http::HttpFetcher;
pub use proxy::RenderProxyFetcher;
pub use rate_limited::{
    board_rate_limiter, BoardRateLimiter, RateLimitedFetcher,
};

/// Browser-like user agent shared by every fetcher that sets one.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// When a fetched page counts as "loaded".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Readiness {
    /// Whatever the server sends first is final
    #[default]
    Immediate,
    /// Wait until an element matching this CSS selector exists
    Selector(String),
}

impl Readiness {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    pub fn as_selector(&self) -> Option<&str> {
        match self {
            Self::Immediate => None,
            Self::Selector(s) => Some(s),
        }
    }

    /// Check a document against the condition.
    ///
    /// An unparseable selector is treated as satisfied so a typo in board
    /// configuration degrades to "no wait" rather than "never ready".
    pub fn is_satisfied(&self, html: &str) -> bool {
        let Some(raw) = self.as_selector() else {
            return true;
        };
        let Ok(selector) = Selector::parse(raw) else {
            return true;
        };
        Html::parse_document(html).select(&selector).next().is_some()
    }
}

/// One page to fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub ready: Readiness,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ready: Readiness::Immediate,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_ready(mut self, ready: Readiness) -> Self {
        self.ready = ready;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Client-side limit when the page is rendered remotely with `timeout`:
    /// the remote limit plus an eighth for the round trip.
    pub fn round_trip_budget(&self) -> Duration {
        self.timeout + self.timeout / 8
    }
}

/// Turns a URL into raw HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String>;

    /// Fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<F> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        (**self).fetch(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        (**self).fetch(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
