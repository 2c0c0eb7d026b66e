//! The aggregation pipeline.
//!
//! For each source, in registry order, pages are requested from 1 up to the
//! page ceiling. An empty page ends that source ("exhausted"). That is a
//! heuristic: a board may have more results behind an empty page, and we
//! would never know. A failed page ends that source too, but only that one.
//! Results are then deduplicated, filtered and capped.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{PageOutcome, SourceAdapter};
use crate::filter::{dedup, FilterChain, FilterCriteria};
use crate::model::{AggregationResult, JobListing, SourceId, SourceReport, SourceStatus};

/// Per-request knobs for [`Aggregator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Lowers every source's page ceiling; never raises it
    pub max_pages: Option<u32>,
    /// Sources drained at once; 1 keeps the strict priority order
    pub source_concurrency: usize,
    /// Cap on returned jobs, applied after filtering
    pub max_results: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            source_concurrency: 1,
            max_results: None,
        }
    }
}

impl RunOptions {
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_source_concurrency(mut self, n: usize) -> Self {
        self.source_concurrency = n.max(1);
        self
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }
}

/// What one source produced during one run.
#[derive(Debug)]
struct SourceRun {
    report: SourceReport,
    jobs: Vec<JobListing>,
}

/// Drives a fixed list of source adapters and folds their output into one
/// [`AggregationResult`].
#[derive(Clone)]
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.adapters.iter().map(|a| a.source())
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Run every source and apply dedup, the filter chain and the result cap.
    ///
    /// Never fails: failed or cancelled sources show up in
    /// [`AggregationResult::sources`] with a count of whatever they produced
    /// before stopping.
    pub async fn run(
        &self,
        query: &str,
        criteria: &FilterCriteria,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> AggregationResult {
        let concurrency = options.source_concurrency.max(1);
        info!(
            query,
            sources = self.adapters.len(),
            concurrency,
            max_pages = ?options.max_pages,
            "Starting aggregation"
        );

        // `buffered` keeps output in input order, so stats stay in priority
        // order even when sources run concurrently.
        let drains: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| drain_source(adapter.as_ref(), query, options.max_pages, cancel))
            .collect();
        let runs: Vec<SourceRun> = stream::iter(drains)
            .buffered(concurrency)
            .collect()
            .await;

        let (collected, stats, sources) = runs.into_iter().fold(
            (Vec::new(), IndexMap::new(), Vec::new()),
            |(mut jobs, mut stats, mut sources), run| {
                stats.insert(run.report.source.to_string(), run.report.count);
                sources.push(run.report);
                jobs.extend(run.jobs);
                (jobs, stats, sources)
            },
        );

        let fetched = collected.len();
        let unique = dedup(collected);
        let total = unique.len();
        let mut jobs = FilterChain::apply(criteria, unique);
        let filtered = jobs.len();
        if let Some(max) = options.max_results {
            jobs.truncate(max);
        }

        info!(
            fetched,
            total,
            filtered,
            returned = jobs.len(),
            failed_sources = sources
                .iter()
                .filter(|r: &&SourceReport| r.status == SourceStatus::Failed)
                .count(),
            "Aggregation finished"
        );

        AggregationResult {
            jobs,
            total,
            filtered,
            stats,
            sources,
        }
    }
}

async fn drain_source(
    adapter: &dyn SourceAdapter,
    query: &str,
    max_pages: Option<u32>,
    cancel: &CancellationToken,
) -> SourceRun {
    let source = adapter.source().clone();
    let ceiling = match max_pages {
        Some(max) => max.min(adapter.page_ceiling()),
        None => adapter.page_ceiling(),
    };

    let mut jobs = Vec::new();
    let mut pages = 0;
    let mut status = SourceStatus::CeilingReached;
    let mut error = None;

    for page in 1..=ceiling {
        if cancel.is_cancelled() {
            status = SourceStatus::Cancelled;
            break;
        }

        pages = page;
        match adapter.fetch_page(query, page, cancel).await {
            PageOutcome::Listings(batch) if batch.is_empty() => {
                debug!(%source, page, "Source exhausted");
                status = SourceStatus::Exhausted;
                break;
            }
            PageOutcome::Listings(batch) => {
                debug!(%source, page, count = batch.len(), "Page collected");
                jobs.extend(batch);
            }
            PageOutcome::Failed(failure) => {
                if cancel.is_cancelled() {
                    status = SourceStatus::Cancelled;
                } else {
                    warn!(%source, page, error = %failure.reason, "Skipping remaining pages");
                    status = SourceStatus::Failed;
                }
                error = Some(failure.to_string());
                break;
            }
        }
    }

    SourceRun {
        report: SourceReport {
            source,
            count: jobs.len(),
            pages,
            status,
            error,
        },
        jobs,
    }
}
