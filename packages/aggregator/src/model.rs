//! Core records shared by adapters, filters and the pipeline.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifies the board a record came from (e.g. `saramin`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single job posting as scraped from a board's search results.
///
/// Free-text fields are stored whitespace-normalized. Empty `experience` or
/// `education` means the board did not say, which every filter treats as a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub link: String,
    pub source: SourceId,
}

/// Identity used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Link(String),
    Title(String),
}

impl JobListing {
    pub fn new(source: SourceId, title: impl AsRef<str>, company: impl AsRef<str>) -> Self {
        Self {
            title: normalize_text(title.as_ref()),
            company: normalize_text(company.as_ref()),
            location: String::new(),
            experience: String::new(),
            education: String::new(),
            link: String::new(),
            source,
        }
    }

    pub fn with_location(mut self, location: impl AsRef<str>) -> Self {
        self.location = normalize_text(location.as_ref());
        self
    }

    pub fn with_experience(mut self, experience: impl AsRef<str>) -> Self {
        self.experience = normalize_text(experience.as_ref());
        self
    }

    pub fn with_education(mut self, education: impl AsRef<str>) -> Self {
        self.education = normalize_text(education.as_ref());
        self
    }

    pub fn with_link(mut self, link: impl AsRef<str>) -> Self {
        self.link = link.as_ref().trim().to_string();
        self
    }

    /// Records without a title or company never leave an adapter.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.company.trim().is_empty()
    }

    /// Link when the board gave us one, title otherwise.
    pub fn dedup_key(&self) -> DedupKey {
        if self.link.is_empty() {
            DedupKey::Title(self.title.clone())
        } else {
            DedupKey::Link(self.link.clone())
        }
    }
}

/// Collapse runs of whitespace (including newlines from markup) into single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// How a source's page loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// A page came back empty
    Exhausted,
    /// Every allowed page returned records
    CeilingReached,
    /// An adapter call failed; remaining pages were skipped
    Failed,
    /// The request was cancelled before the source finished
    Cancelled,
}

/// Health of one source for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: SourceId,
    pub count: usize,
    pub pages: u32,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one aggregation run, built fresh per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub jobs: Vec<JobListing>,
    /// Records after deduplication, before filtering
    pub total: usize,
    /// Records after filtering, before the response cap
    pub filtered: usize,
    /// Records fetched per source, in priority order
    pub stats: IndexMap<String, usize>,
    pub sources: Vec<SourceReport>,
}

impl AggregationResult {
    /// Sources that failed during this run.
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|r| r.status == SourceStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_whitespace() {
        let job = JobListing::new("saramin".into(), "  백엔드\n  개발자 ", "ACME\t")
            .with_location(" 서울 \n 강남구 ")
            .with_link(" https://example.com/1 ");

        assert_eq!(job.title, "백엔드 개발자");
        assert_eq!(job.company, "ACME");
        assert_eq!(job.location, "서울 강남구");
        assert_eq!(job.link, "https://example.com/1");
        assert!(job.is_complete());
    }

    #[test]
    fn test_incomplete_listing() {
        let job = JobListing::new("saramin".into(), "   ", "ACME");
        assert!(!job.is_complete());

        let job = JobListing::new("saramin".into(), "개발자", "");
        assert!(!job.is_complete());
    }

    #[test]
    fn test_dedup_key_falls_back_to_title() {
        let with_link =
            JobListing::new("a".into(), "개발자", "ACME").with_link("https://example.com/1");
        assert_eq!(
            with_link.dedup_key(),
            DedupKey::Link("https://example.com/1".into())
        );

        let without_link = JobListing::new("a".into(), "개발자", "ACME");
        assert_eq!(without_link.dedup_key(), DedupKey::Title("개발자".into()));
    }

    #[test]
    fn test_serializes_camel_case_with_source() {
        let job = JobListing::new("jobkorea".into(), "개발자", "ACME");
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["source"], "jobkorea");
        assert_eq!(value["experience"], "");
    }

    #[test]
    fn test_source_report_omits_empty_error() {
        let report = SourceReport {
            source: "saramin".into(),
            count: 20,
            pages: 2,
            status: SourceStatus::Exhausted,
            error: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "exhausted");
        assert!(value.get("error").is_none());
    }
}
