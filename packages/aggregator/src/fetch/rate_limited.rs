//! Rate-limited fetcher wrapper.
//!
//! Wraps any PageFetcher with a governor quota so a board's page loop paces
//! itself instead of sleeping a fixed interval between pages. The quota is
//! keyed by board and the limiter outlives requests: every request hitting
//! the same board draws from the same allowance.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use super::{FetchRequest, PageFetcher};
use crate::error::FetchResult;
use crate::model::SourceId;

/// One quota per board, shared across requests.
pub type BoardRateLimiter = DefaultKeyedRateLimiter<SourceId>;

/// A zero rate is bumped to one request per second.
pub fn board_rate_limiter(requests_per_second: u32) -> Arc<BoardRateLimiter> {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::keyed(Quota::per_second(rate)))
}

pub struct RateLimitedFetcher<F> {
    inner: F,
    board: SourceId,
    limiter: Arc<BoardRateLimiter>,
}

impl<F: PageFetcher> RateLimitedFetcher<F> {
    pub fn new(fetcher: F, board: SourceId, limiter: Arc<BoardRateLimiter>) -> Self {
        Self {
            inner: fetcher,
            board,
            limiter,
        }
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        self.limiter.until_key_ready(&self.board).await;
        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
