//! Fallback fetcher - tries the primary fetcher first, falls back to the
//! render proxy when the board blocks us.
//!
//! Cooperative boards stay free; only blocked requests spend proxy credits.

use async_trait::async_trait;
use tracing::warn;

use super::{FetchRequest, PageFetcher};
use crate::error::FetchResult;

pub struct FallbackFetcher<P, F> {
    primary: P,
    fallback: Option<F>,
}

impl<P: PageFetcher, F: PageFetcher> FallbackFetcher<P, F> {
    /// If `fallback` is None, blocking errors are returned as-is.
    pub fn new(primary: P, fallback: Option<F>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: PageFetcher, F: PageFetcher> PageFetcher for FallbackFetcher<P, F> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        match self.primary.fetch(request).await {
            Ok(html) => Ok(html),
            Err(e) if e.is_blocking() => match self.fallback {
                Some(ref fallback) => {
                    warn!(
                        url = %request.url,
                        error = %e,
                        fallback = fallback.name(),
                        "Primary fetch blocked, falling back"
                    );
                    fallback.fetch(request).await
                }
                None => {
                    warn!(url = %request.url, "Board blocking requests but no fallback configured");
                    Err(e)
                }
            },
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}
