use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{decode_entities, resolve_link, ListingExtractor};
use crate::error::ConfigError;
use crate::model::{normalize_text, JobListing, SourceId};

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Regular expressions for boards whose markup is easier to match than to
/// walk. Each field pattern must have one capture group; `item` captures the
/// card body the other patterns run against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSpec {
    pub item: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

pub struct PatternExtractor {
    item: Regex,
    title: Regex,
    company: Regex,
    location: Option<Regex>,
    experience: Option<Regex>,
    education: Option<Regex>,
    link: Option<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_opt(pattern: &Option<String>) -> Result<Option<Regex>, ConfigError> {
    pattern.as_deref().map(compile).transpose()
}

/// First capture group with tags stripped and entities decoded.
fn capture(regex: &Regex, haystack: &str) -> String {
    regex
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| {
            let text = TAG_REGEX.replace_all(m.as_str(), " ");
            normalize_text(&decode_entities(&text))
        })
        .unwrap_or_default()
}

fn capture_opt(regex: &Option<Regex>, haystack: &str) -> String {
    regex
        .as_ref()
        .map(|r| capture(r, haystack))
        .unwrap_or_default()
}

impl PatternExtractor {
    pub fn new(spec: &PatternSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            item: compile(&spec.item)?,
            title: compile(&spec.title)?,
            company: compile(&spec.company)?,
            location: compile_opt(&spec.location)?,
            experience: compile_opt(&spec.experience)?,
            education: compile_opt(&spec.education)?,
            link: compile_opt(&spec.link)?,
        })
    }
}

impl ListingExtractor for PatternExtractor {
    fn extract(&self, html: &str, page_url: &Url, source: &SourceId) -> Vec<JobListing> {
        self.item
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|body| {
                let body = body.as_str();
                let link = self
                    .link
                    .as_ref()
                    .and_then(|r| r.captures(body))
                    .and_then(|c| c.get(1))
                    .map(|m| resolve_link(page_url, &decode_entities(m.as_str())))
                    .unwrap_or_default();

                JobListing::new(
                    source.clone(),
                    capture(&self.title, body),
                    capture(&self.company, body),
                )
                .with_location(capture_opt(&self.location, body))
                .with_experience(capture_opt(&self.experience, body))
                .with_education(capture_opt(&self.education, body))
                .with_link(link)
            })
            .filter(JobListing::is_complete)
            .collect()
    }
}
