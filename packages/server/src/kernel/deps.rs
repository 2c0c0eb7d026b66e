//! Long-lived dependencies shared by every request.

use std::sync::Arc;
use std::time::Duration;

use aggregator::{
    board_rate_limiter, BoardRateLimiter, BrowserLauncher, ChromeConfig, HeadlessChromeLauncher,
    HttpFetcher, PageFetcher, RenderProxyFetcher, SourceRegistry,
};
use anyhow::{Context, Result};

use crate::config::Config;

/// Per-request limits taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub request_deadline: Duration,
    pub source_concurrency: usize,
    pub max_results: usize,
    pub max_pages_cap: u32,
    pub requests_per_second: u32,
}

impl From<&Config> for SearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            request_deadline: Duration::from_secs(config.request_deadline_secs),
            source_concurrency: config.source_concurrency.max(1),
            max_results: config.max_results,
            max_pages_cap: config.max_pages_cap.max(1),
            requests_per_second: config.requests_per_second,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Server dependencies: board registry, fetchers and the browser launcher.
///
/// Nothing here holds per-request state. The browser session is launched per
/// request through `launcher` and owned by that request. `rate_limiter` is
/// the per-board politeness quota every request draws from.
#[derive(Clone)]
pub struct ServerDeps {
    pub registry: SourceRegistry,
    pub http: Arc<dyn PageFetcher>,
    pub proxy: Option<Arc<dyn PageFetcher>>,
    pub launcher: Arc<dyn BrowserLauncher>,
    pub rate_limiter: Arc<BoardRateLimiter>,
    pub settings: SearchSettings,
}

impl ServerDeps {
    pub fn new(
        registry: SourceRegistry,
        http: Arc<dyn PageFetcher>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let settings = SearchSettings::default();
        Self {
            registry,
            http,
            proxy: None,
            launcher,
            rate_limiter: board_rate_limiter(settings.requests_per_second),
            settings,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<Arc<dyn PageFetcher>>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Replaces the rate limiter too, so call this before sharing the deps.
    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.rate_limiter = board_rate_limiter(settings.requests_per_second);
        self.settings = settings;
        self
    }

    /// Production wiring: built-in boards, reqwest, Firecrawl when a key is set, headless Chrome.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry =
            SourceRegistry::with_defaults().context("Built-in board configuration is invalid")?;
        if !config.browser_sources_enabled {
            registry = registry.without_browser();
            tracing::info!("Browser-rendered boards disabled");
        }

        let http: Arc<dyn PageFetcher> =
            Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);

        let proxy: Option<Arc<dyn PageFetcher>> = match config.firecrawl_api_key.clone() {
            Some(key) => {
                let fetcher =
                    RenderProxyFetcher::new(key).context("Failed to build render proxy client")?;
                Some(Arc::new(fetcher))
            }
            None => {
                tracing::warn!("FIRECRAWL_API_KEY not set, render proxy and fallback disabled");
                None
            }
        };

        let launcher = Arc::new(HeadlessChromeLauncher::new(ChromeConfig {
            path: config.chrome_path.clone(),
            ..Default::default()
        }));

        tracing::info!(
            boards = ?registry.ids().iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            render_proxy = proxy.is_some(),
            "Server dependencies ready"
        );

        Ok(Self::new(registry, http, launcher)
            .with_proxy(proxy)
            .with_settings(SearchSettings::from(config)))
    }
}
