//! Render-proxy fetcher backed by the Firecrawl scrape API.
//!
//! Firecrawl runs the page in its own browser, so boards that assemble their
//! result list in JavaScript come back fully rendered. Readiness selectors are
//! forwarded as a `wait` action instead of sleeping on our side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FetchRequest, PageFetcher};
use crate::error::{FetchError, FetchResult};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Fetcher that renders pages through Firecrawl.
pub struct RenderProxyFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'static str>,
    /// Milliseconds Firecrawl may spend on the page
    timeout: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    actions: Vec<WaitAction<'a>>,
}

#[derive(Serialize)]
struct WaitAction<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    selector: &'a str,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    #[serde(rename = "rawHtml")]
    raw_html: Option<String>,
}

impl RenderProxyFetcher {
    pub fn new(api_key: impl Into<String>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(FetchError::network)?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Point at a different API root (self-hosted Firecrawl, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body<'a>(request: &'a FetchRequest) -> ScrapeRequest<'a> {
        let actions = request
            .ready
            .as_selector()
            .map(|selector| {
                vec![WaitAction {
                    kind: "wait",
                    selector,
                }]
            })
            .unwrap_or_default();

        ScrapeRequest {
            url: &request.url,
            formats: vec!["rawHtml"],
            timeout: request.timeout.as_millis() as u64,
            actions,
        }
    }
}

#[async_trait]
impl PageFetcher for RenderProxyFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        debug!(url = %request.url, "Render proxy fetch starting");

        let endpoint = format!("{}/scrape", self.base_url);
        let budget = request.round_trip_budget();

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .timeout(budget)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: request.url.clone(),
                        after: budget,
                    }
                } else {
                    FetchError::network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::Proxy(format!("{} - {}", status, text)));
        }

        let body: ScrapeResponse = response.json().await.map_err(FetchError::network)?;
        if !body.success {
            return Err(FetchError::Proxy(
                body.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            ));
        }

        body.data
            .and_then(|d| d.raw_html)
            .ok_or_else(|| FetchError::Proxy("no rawHtml in response".to_string()))
    }

    fn name(&self) -> &str {
        "render_proxy"
    }
}
