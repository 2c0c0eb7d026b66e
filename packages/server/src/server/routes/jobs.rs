use aggregator::{AggregationResult, JobListing, SourceReport};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::kernel::{run_job_search, JobSearchRequest};
use crate::server::app::AppState;

/// Body of every `POST /api/scrape/jobs` response, success or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSearchResponse {
    pub jobs: Vec<JobListing>,
    pub total: usize,
    pub filtered: usize,
    pub stats: IndexMap<String, usize>,
    pub sources: Vec<SourceReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSearchResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

impl From<AggregationResult> for JobSearchResponse {
    fn from(result: AggregationResult) -> Self {
        Self {
            jobs: result.jobs,
            total: result.total,
            filtered: result.filtered,
            stats: result.stats,
            sources: result.sources,
            error: None,
        }
    }
}

/// Search every configured board.
///
/// Always answers 200; failures travel in the `error` field. Per-board
/// failures do not set `error`, they show up in `sources`.
pub async fn scrape_jobs_handler(
    Extension(state): Extension<AppState>,
    payload: Result<Json<JobSearchRequest>, JsonRejection>,
) -> Json<JobSearchResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected job search body");
            return Json(JobSearchResponse::error(rejection.body_text()));
        }
    };

    // Dropping this handler (client went away) cancels the search
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match run_job_search(&state.deps, &request, &cancel).await {
        Ok(result) => Json(result.into()),
        Err(e) => {
            error!(error = %e, query = %request.query, "Job search failed");
            Json(JobSearchResponse::error(e.to_string()))
        }
    }
}
