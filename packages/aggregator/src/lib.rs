//! Job Board Aggregation Library
//!
//! Queries a fixed list of Korean job boards page by page, folds the results
//! into one deduplicated list and narrows it with a chain of optional filters.
//!
//! # Design
//!
//! - Fetching markup and extracting records are separate seams
//!   ([`PageFetcher`], [`ListingExtractor`]), so either can be stubbed
//! - Adapters never fail: every page ends as [`PageOutcome::Listings`] or
//!   [`PageOutcome::Failed`]
//! - One failed board never aborts the others
//! - Results are folded per source, never accumulated in shared state
//!
//! # Usage
//!
//! ```rust,ignore
//! use aggregator::{AdapterDeps, Aggregator, FilterCriteria, HttpFetcher, RunOptions, SourceRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = SourceRegistry::with_defaults()?.without_browser();
//! let deps = AdapterDeps::new(Arc::new(HttpFetcher::new()?));
//! let aggregator = Aggregator::new(registry.build_adapters(&deps));
//!
//! let criteria = FilterCriteria::for_query("백엔드 개발자").with_regions(["서울"]);
//! let result = aggregator
//!     .run("백엔드 개발자", &criteria, &RunOptions::default(), &CancellationToken::new())
//!     .await;
//! ```
//!
//! # Modules
//!
//! - [`model`] - Listings, per-source reports and the aggregation result
//! - [`fetch`] - Page fetchers (HTTP, render proxy, browser, fallback, rate limiting)
//! - [`browser`] - Headless Chrome sessions and the request-scoped lease
//! - [`extract`] - CSS selector and regex listing extractors
//! - [`adapter`] - The per-board adapter contract
//! - [`registry`] - Board configuration and adapter construction
//! - [`filter`] - Deduplication and the filter chain
//! - [`pipeline`] - The aggregation driver
//! - [`testing`] - Mock implementations for testing

pub mod adapter;
pub mod browser;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod testing;

pub use adapter::{BoardAdapter, PageOutcome, SourceAdapter};
pub use browser::{
    BrowserLauncher, BrowserLease, BrowserSession, ChromeConfig, HeadlessChromeLauncher,
};
pub use error::{
    AdapterFailure, ConfigError, FetchError, FetchResult, PipelineError, Result,
};
pub use extract::{ExtractorSpec, ListingExtractor, PatternSpec, SelectorSpec};
pub use fetch::{
    board_rate_limiter, BoardRateLimiter, BrowserFetcher, FallbackFetcher, FetchRequest,
    HttpFetcher, PageFetcher, RateLimitedFetcher, Readiness, RenderProxyFetcher,
};
pub use filter::{EducationLevel, FilterChain, FilterCriteria, FilterStage};
pub use model::{AggregationResult, JobListing, SourceId, SourceReport, SourceStatus};
pub use pipeline::{Aggregator, RunOptions};
pub use registry::{
    default_boards, AdapterDeps, BoardConfig, BoardSummary, FetchStrategy, SourceRegistry,
};
