//! Extracting job listings from raw markup.
//!
//! Extractors are pure and synchronous. They never fail: markup that does not
//! match simply yields fewer records, and records without a title or company
//! are dropped before they leave the extractor.

mod pattern;
mod selector;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::model::{JobListing, SourceId};

pub use pattern::{PatternExtractor, PatternSpec};
pub use selector::{SelectorExtractor, SelectorSpec};

/// Turns one search-results page into listings.
pub trait ListingExtractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &Url, source: &SourceId) -> Vec<JobListing>;
}

impl<E: ListingExtractor + ?Sized> ListingExtractor for Arc<E> {
    fn extract(&self, html: &str, page_url: &Url, source: &SourceId) -> Vec<JobListing> {
        (**self).extract(html, page_url, source)
    }
}

/// Declarative extractor configuration, compiled once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorSpec {
    Css(SelectorSpec),
    Pattern(PatternSpec),
}

impl ExtractorSpec {
    pub fn compile(&self) -> Result<Arc<dyn ListingExtractor>, ConfigError> {
        Ok(match self {
            Self::Css(spec) => Arc::new(SelectorExtractor::new(spec)?),
            Self::Pattern(spec) => Arc::new(PatternExtractor::new(spec)?),
        })
    }
}

/// Resolve a scraped href against the page it came from.
///
/// `javascript:` and fragment-only links resolve to an empty string.
pub(crate) fn resolve_link(page_url: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return String::new();
    }
    page_url
        .join(href)
        .map(|u| u.to_string())
        .unwrap_or_default()
}

/// Decode the handful of entities boards actually emit in listing text.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}
