use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{resolve_link, ListingExtractor};
use crate::error::ConfigError;
use crate::model::{normalize_text, JobListing, SourceId};

/// CSS selectors for one board's result cards.
///
/// Every selector except `item` is evaluated inside the matched card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// One match per job card
    pub item: String,
    pub title: String,
    /// Read the title from this attribute instead of the element text
    #[serde(default)]
    pub title_attr: Option<String>,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    /// Anchor holding the posting URL; defaults to the title element
    #[serde(default)]
    pub link: Option<String>,
}

pub struct SelectorExtractor {
    item: Selector,
    title: Selector,
    title_attr: Option<String>,
    company: Selector,
    location: Option<Selector>,
    experience: Option<Selector>,
    education: Option<Selector>,
    link: Option<Selector>,
}

fn parse(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn parse_opt(selector: &Option<String>) -> Result<Option<Selector>, ConfigError> {
    selector.as_deref().map(parse).transpose()
}

impl SelectorExtractor {
    pub fn new(spec: &SelectorSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            item: parse(&spec.item)?,
            title: parse(&spec.title)?,
            title_attr: spec.title_attr.clone(),
            company: parse(&spec.company)?,
            location: parse_opt(&spec.location)?,
            experience: parse_opt(&spec.experience)?,
            education: parse_opt(&spec.education)?,
            link: parse_opt(&spec.link)?,
        })
    }

    fn text_of(card: &ElementRef, selector: &Selector) -> String {
        card.select(selector)
            .next()
            .map(|el| normalize_text(&el.text().collect::<String>()))
            .unwrap_or_default()
    }

    fn opt_text_of(card: &ElementRef, selector: &Option<Selector>) -> String {
        selector
            .as_ref()
            .map(|s| Self::text_of(card, s))
            .unwrap_or_default()
    }

    fn title_of(&self, card: &ElementRef) -> String {
        let Some(el) = card.select(&self.title).next() else {
            return String::new();
        };
        let from_attr = self
            .title_attr
            .as_deref()
            .and_then(|attr| el.value().attr(attr))
            .map(normalize_text)
            .filter(|t| !t.is_empty());

        from_attr.unwrap_or_else(|| normalize_text(&el.text().collect::<String>()))
    }

    fn link_of(&self, card: &ElementRef, page_url: &Url) -> String {
        let selector = self.link.as_ref().unwrap_or(&self.title);
        card.select(selector)
            .find_map(|el| el.value().attr("href"))
            .map(|href| resolve_link(page_url, href))
            .unwrap_or_default()
    }
}

impl ListingExtractor for SelectorExtractor {
    fn extract(&self, html: &str, page_url: &Url, source: &SourceId) -> Vec<JobListing> {
        let document = Html::parse_document(html);

        document
            .select(&self.item)
            .map(|card| {
                JobListing::new(
                    source.clone(),
                    self.title_of(&card),
                    Self::text_of(&card, &self.company),
                )
                .with_location(Self::opt_text_of(&card, &self.location))
                .with_experience(Self::opt_text_of(&card, &self.experience))
                .with_education(Self::opt_text_of(&card, &self.education))
                .with_link(self.link_of(&card, page_url))
            })
            .filter(JobListing::is_complete)
            .collect()
    }
}
