//! One job search: request parsing, browser lease, pipeline run.

use aggregator::filter::parse_years;
use aggregator::{
    AdapterDeps, AggregationResult, Aggregator, BrowserLease, EducationLevel, FilterCriteria,
    PipelineError, RunOptions, SourceRegistry,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::deps::ServerDeps;

/// A value clients send either as a number or as text (`3`, `"3"`, `"3년"`).
///
/// Anything else (`2.5`, `-1`, `true`) lands in `Other` so the request still
/// parses; the filter it was meant for is then skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Number(u32),
    Text(String),
    Other(serde_json::Value),
}

impl LooseValue {
    fn to_text(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Other(_) => None,
        }
    }
}

/// Body of `POST /api/scrape/jobs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub max_experience: Option<LooseValue>,
    #[serde(default)]
    pub max_education: Option<LooseValue>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Restrict to these board ids
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl JobSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Filter criteria for this request.
    ///
    /// Unparseable ceilings disable their filter rather than rejecting the request.
    pub fn criteria(&self) -> FilterCriteria {
        let max_experience = self.max_experience.as_ref().and_then(|value| {
            let years = match value {
                LooseValue::Number(n) => Some(*n),
                LooseValue::Text(s) if s.trim().is_empty() => return None,
                LooseValue::Text(s) => parse_years(s),
                LooseValue::Other(_) => None,
            };
            if years.is_none() {
                warn!(value = ?value, "Ignoring unparseable maxExperience");
            }
            years
        });

        let max_education = self.max_education.as_ref().and_then(|value| {
            let level = match value.to_text() {
                Some(text) if text.trim().is_empty() => return None,
                Some(text) => EducationLevel::parse(&text),
                None => None,
            };
            if level.is_none() {
                warn!(value = ?value, "Ignoring unparseable maxEducation");
            }
            level
        });

        FilterCriteria::for_query(&self.query)
            .with_regions(&self.regions)
            .with_max_experience(max_experience)
            .with_max_education(max_education)
    }

    /// Requested page count clamped to `1..=cap`; the cap when unset.
    pub fn page_limit(&self, cap: u32) -> u32 {
        self.max_pages.unwrap_or(cap).clamp(1, cap.max(1))
    }

    fn registry(&self, registry: &SourceRegistry) -> Result<SourceRegistry, PipelineError> {
        let Some(ids) = &self.sources else {
            return Ok(registry.clone());
        };
        let selected = registry.with_only(ids.as_slice());
        if selected.is_empty() {
            return Err(PipelineError::InvalidRequest {
                reason: format!("no known sources among {:?}", ids),
            });
        }
        Ok(selected)
    }
}

/// Run one search end to end.
///
/// The browser session, when any selected board needs one, lives exactly as
/// long as this call. The request deadline cancels a child of `cancel`, so
/// the caller's token is never tripped by it.
pub async fn run_job_search(
    deps: &ServerDeps,
    request: &JobSearchRequest,
    cancel: &CancellationToken,
) -> Result<AggregationResult, PipelineError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(PipelineError::InvalidRequest {
            reason: "query must not be empty".to_string(),
        });
    }

    let registry = request.registry(&deps.registry)?;
    let criteria = request.criteria();
    let settings = &deps.settings;

    let lease = if registry.needs_browser() {
        BrowserLease::acquire(deps.launcher.as_ref())
            .await
            .map_err(PipelineError::SessionUnavailable)?
    } else {
        BrowserLease::empty()
    };

    let adapter_deps = AdapterDeps::new(deps.http.clone())
        .with_proxy(deps.proxy.clone())
        .with_browser(lease.session())
        .with_rate_limiter(deps.rate_limiter.clone());
    let aggregator = Aggregator::new(registry.build_adapters(&adapter_deps));

    let options = RunOptions::default()
        .with_max_pages(Some(request.page_limit(settings.max_pages_cap)))
        .with_source_concurrency(settings.source_concurrency)
        .with_max_results(Some(settings.max_results));

    let cancel = cancel.child_token();
    let run = aggregator.run(query, &criteria, &options, &cancel);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::time::sleep(settings.request_deadline) => {
            warn!(deadline = ?settings.request_deadline, "Request deadline reached, cancelling remaining sources");
            cancel.cancel();
            run.await
        }
    };

    lease.release().await;

    info!(
        query,
        total = result.total,
        filtered = result.filtered,
        returned = result.jobs.len(),
        "Job search finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_loose_values() {
        let request: JobSearchRequest = serde_json::from_str(
            r#"{"query":"백엔드","regions":["서울"],"maxExperience":"3","maxEducation":"대졸","maxPages":2}"#,
        )
        .unwrap();

        assert_eq!(request.max_experience, Some(LooseValue::Text("3".into())));
        assert_eq!(request.max_pages, Some(2));

        let criteria = request.criteria();
        assert_eq!(criteria.query_keywords, vec!["백엔드"]);
        assert_eq!(criteria.regions, vec!["서울"]);
        assert_eq!(criteria.max_experience_years, Some(3));
        assert_eq!(criteria.max_education, Some(EducationLevel::Bachelor));
    }

    #[test]
    fn test_numeric_experience_and_garbage_education() {
        let request: JobSearchRequest =
            serde_json::from_str(r#"{"query":"dev","maxExperience":5,"maxEducation":"???"}"#)
                .unwrap();

        let criteria = request.criteria();
        assert_eq!(criteria.max_experience_years, Some(5));
        assert_eq!(criteria.max_education, None);
    }

    #[test]
    fn test_empty_strings_disable_filters() {
        let request: JobSearchRequest =
            serde_json::from_str(r#"{"query":"dev","maxExperience":"","maxEducation":""}"#)
                .unwrap();

        let criteria = request.criteria();
        assert_eq!(criteria.max_experience_years, None);
        assert_eq!(criteria.max_education, None);
    }

    #[test]
    fn test_page_limit_is_clamped() {
        let mut request = JobSearchRequest::new("dev");
        assert_eq!(request.page_limit(5), 5);

        request.max_pages = Some(0);
        assert_eq!(request.page_limit(5), 1);

        request.max_pages = Some(50);
        assert_eq!(request.page_limit(5), 5);

        request.max_pages = Some(2);
        assert_eq!(request.page_limit(5), 2);
    }

    #[test]
    fn test_out_of_range_values_disable_filters_without_rejecting() {
        let request: JobSearchRequest = serde_json::from_str(
            r#"{"query":"dev","regions":["서울"],"maxExperience":2.5,"maxEducation":-1}"#,
        )
        .unwrap();

        assert!(matches!(request.max_experience, Some(LooseValue::Other(_))));
        let criteria = request.criteria();
        assert_eq!(criteria.max_experience_years, None);
        assert_eq!(criteria.max_education, None);
        assert_eq!(criteria.regions, vec!["서울"]);

        let request: JobSearchRequest =
            serde_json::from_str(r#"{"query":"dev","maxExperience":-1}"#).unwrap();
        assert_eq!(request.criteria().max_experience_years, None);
    }
}
