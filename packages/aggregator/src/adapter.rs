//! Source adapters: one board, one page at a time.
//!
//! The adapter boundary is where failures stop. Whatever goes wrong inside a
//! fetch or an extraction (network errors, timeouts, selector misses, even
//! panics) comes out as [`PageOutcome::Failed`], never as an error or an
//! unwinding panic, so the pipeline can treat every board the same way.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AdapterFailure, FetchError, FetchResult};
use crate::extract::ListingExtractor;
use crate::fetch::{FetchRequest, PageFetcher};
use crate::model::{JobListing, SourceId};
use crate::registry::BoardConfig;

/// Result of asking a board for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page loaded; an empty vector means the board has no more results
    Listings(Vec<JobListing>),
    /// Page could not be loaded or parsed
    Failed(AdapterFailure),
}

impl PageOutcome {
    /// Records on success, nothing on failure.
    pub fn into_listings(self) -> Vec<JobListing> {
        match self {
            Self::Listings(jobs) => jobs,
            Self::Failed(_) => Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One external job board behind a uniform, infallible contract.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> &SourceId;

    /// Most pages the pipeline may ask for in one request.
    fn page_ceiling(&self) -> u32;

    /// Page `page` (1-based) of search results for `query`.
    async fn fetch_page(&self, query: &str, page: u32, cancel: &CancellationToken)
        -> PageOutcome;
}

/// A board adapter built from a fetcher, an extractor and board settings.
pub struct BoardAdapter<F, E> {
    board: BoardConfig,
    fetcher: F,
    extractor: E,
}

impl<F: PageFetcher, E: ListingExtractor> BoardAdapter<F, E> {
    pub fn new(board: BoardConfig, fetcher: F, extractor: E) -> Self {
        Self {
            board,
            fetcher,
            extractor,
        }
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    async fn load(&self, query: &str, page: u32) -> FetchResult<Vec<JobListing>> {
        let url = self.board.page_url(query, page);
        let page_url = Url::parse(&url).map_err(|_| FetchError::InvalidUrl { url: url.clone() })?;

        let request = FetchRequest::new(url)
            .with_ready(self.board.ready.clone())
            .with_timeout(self.board.timeout);
        let html = self.fetcher.fetch(&request).await?;

        let mut jobs = self.extractor.extract(&html, &page_url, &self.board.id);
        jobs.retain(JobListing::is_complete);
        jobs.truncate(self.board.per_page_cap);

        debug!(
            source = %self.board.id,
            page,
            fetcher = self.fetcher.name(),
            count = jobs.len(),
            "Page extracted"
        );
        Ok(jobs)
    }

    fn failed(&self, page: u32, reason: impl Into<String>) -> PageOutcome {
        let failure = AdapterFailure::new(page, reason);
        warn!(source = %self.board.id, page, error = %failure.reason, "Board page failed");
        PageOutcome::Failed(failure)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[async_trait]
impl<F: PageFetcher, E: ListingExtractor> SourceAdapter for BoardAdapter<F, E> {
    fn source(&self) -> &SourceId {
        &self.board.id
    }

    fn page_ceiling(&self) -> u32 {
        self.board.page_ceiling
    }

    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> PageOutcome {
        if cancel.is_cancelled() {
            return self.failed(page, FetchError::Cancelled.to_string());
        }

        let work = AssertUnwindSafe(self.load(query, page)).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.failed(page, FetchError::Cancelled.to_string()),
            outcome = tokio::time::timeout(self.board.call_budget(), work) => outcome,
        };

        match outcome {
            Ok(Ok(Ok(jobs))) => PageOutcome::Listings(jobs),
            Ok(Ok(Err(e))) => self.failed(page, e.to_string()),
            Ok(Err(payload)) => self.failed(page, panic_message(payload)),
            Err(_) => self.failed(
                page,
                FetchError::Timeout {
                    url: self.board.page_url(query, page),
                    after: self.board.call_budget(),
                }
                .to_string(),
            ),
        }
    }
}
