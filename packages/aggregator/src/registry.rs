//! Board configuration and the fixed-priority list of boards.
//!
//! Selectors here track third-party markup and will drift; they are data, and
//! a broken selector shows up as an exhausted (empty) source rather than an
//! error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::adapter::{BoardAdapter, SourceAdapter};
use crate::browser::BrowserSession;
use crate::error::ConfigError;
use crate::extract::{ExtractorSpec, ListingExtractor, SelectorSpec};
use crate::fetch::{
    board_rate_limiter, BoardRateLimiter, BrowserFetcher, FallbackFetcher, PageFetcher,
    RateLimitedFetcher, Readiness,
};
use crate::model::SourceId;

/// How a board's pages are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Server-rendered; plain HTTP (render proxy on block, if configured)
    Http,
    /// Client-rendered; third-party render proxy
    RenderProxy,
    /// Client-rendered; the request's headless browser
    Browser,
}

/// Everything needed to query one board.
///
/// `search_url` placeholders: `{query}` (URL-encoded), `{page}` (1-based),
/// `{per_page}` and `{offset}` (`(page - 1) * per_page`).
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub id: SourceId,
    pub display_name: String,
    pub search_url: String,
    pub per_page_cap: usize,
    pub page_ceiling: u32,
    pub timeout: Duration,
    pub strategy: FetchStrategy,
    pub ready: Readiness,
    pub extractor: ExtractorSpec,
}

impl BoardConfig {
    pub fn new(id: &str, search_url: impl Into<String>, extractor: ExtractorSpec) -> Self {
        Self {
            id: SourceId::new(id),
            display_name: id.to_string(),
            search_url: search_url.into(),
            per_page_cap: 20,
            page_ceiling: 3,
            timeout: Duration::from_secs(30),
            strategy: FetchStrategy::Http,
            ready: Readiness::Immediate,
            extractor,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_page_ceiling(mut self, pages: u32) -> Self {
        self.page_ceiling = pages;
        self
    }

    pub fn with_per_page_cap(mut self, cap: usize) -> Self {
        self.per_page_cap = cap;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ready(mut self, ready: Readiness) -> Self {
        self.ready = ready;
        self
    }

    /// Wall-clock limit for one adapter call.
    ///
    /// Fetchers get `timeout`; the extra quarter covers rate-limit waits and
    /// remote round trips, so a fetcher's own limit always expires first.
    pub fn call_budget(&self) -> Duration {
        self.timeout + self.timeout / 4
    }

    /// Search URL for one page of results.
    pub fn page_url(&self, query: &str, page: u32) -> String {
        let offset = (page.saturating_sub(1) as usize) * self.per_page_cap;
        self.search_url
            .replace("{query}", &urlencoding::encode(query))
            .replace("{page}", &page.to_string())
            .replace("{per_page}", &self.per_page_cap.to_string())
            .replace("{offset}", &offset.to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBoard {
            board: self.id.to_string(),
            reason: reason.to_string(),
        };

        if self.page_ceiling == 0 {
            return Err(invalid("page_ceiling must be at least 1"));
        }
        if self.per_page_cap == 0 {
            return Err(invalid("per_page_cap must be at least 1"));
        }
        let sample = self.page_url("test", 1);
        if Url::parse(&sample).is_err() {
            return Err(ConfigError::InvalidSearchUrl {
                board: self.id.to_string(),
                url: self.search_url.clone(),
            });
        }
        Ok(())
    }
}

/// Serializable view of a board for listings and diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: SourceId,
    pub display_name: String,
    pub strategy: FetchStrategy,
    pub page_ceiling: u32,
    pub per_page_cap: usize,
    pub timeout_secs: u64,
}

/// Shared fetch resources handed to the registry when building adapters.
///
/// `rate_limiter` should be created once and reused for every request; a
/// fresh limiter starts with a full allowance.
#[derive(Clone)]
pub struct AdapterDeps {
    pub http: Arc<dyn PageFetcher>,
    pub proxy: Option<Arc<dyn PageFetcher>>,
    pub browser: Option<Arc<dyn BrowserSession>>,
    pub rate_limiter: Arc<BoardRateLimiter>,
}

impl AdapterDeps {
    pub fn new(http: Arc<dyn PageFetcher>) -> Self {
        Self {
            http,
            proxy: None,
            browser: None,
            rate_limiter: board_rate_limiter(2),
        }
    }

    pub fn with_proxy(mut self, proxy: Option<Arc<dyn PageFetcher>>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_browser(mut self, browser: Option<Arc<dyn BrowserSession>>) -> Self {
        self.browser = browser;
        self
    }

    /// Fresh limiter at `rps` per board.
    pub fn with_requests_per_second(self, rps: u32) -> Self {
        self.with_rate_limiter(board_rate_limiter(rps))
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<BoardRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

#[derive(Clone)]
struct Board {
    config: BoardConfig,
    extractor: Arc<dyn ListingExtractor>,
}

/// Boards in fixed priority order, primary board first.
#[derive(Clone)]
pub struct SourceRegistry {
    boards: Vec<Board>,
}

impl SourceRegistry {
    /// Validate boards and compile their extractors.
    pub fn new(configs: Vec<BoardConfig>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut boards = Vec::with_capacity(configs.len());

        for config in configs {
            if !seen.insert(config.id.clone()) {
                return Err(ConfigError::DuplicateBoard(config.id.to_string()));
            }
            config.validate()?;
            let extractor = config.extractor.compile()?;
            boards.push(Board { config, extractor });
        }

        Ok(Self { boards })
    }

    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(default_boards())
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.boards.iter().map(|b| b.config.id.clone()).collect()
    }

    pub fn summaries(&self) -> Vec<BoardSummary> {
        self.boards
            .iter()
            .map(|b| BoardSummary {
                id: b.config.id.clone(),
                display_name: b.config.display_name.clone(),
                strategy: b.config.strategy,
                page_ceiling: b.config.page_ceiling,
                per_page_cap: b.config.per_page_cap,
                timeout_secs: b.config.timeout.as_secs(),
            })
            .collect()
    }

    /// Whether serving a request needs the headless browser.
    pub fn needs_browser(&self) -> bool {
        self.boards
            .iter()
            .any(|b| b.config.strategy == FetchStrategy::Browser)
    }

    /// Drop browser-rendered boards.
    pub fn without_browser(&self) -> Self {
        Self {
            boards: self
                .boards
                .iter()
                .filter(|b| b.config.strategy != FetchStrategy::Browser)
                .cloned()
                .collect(),
        }
    }

    /// Keep only the named boards, preserving priority order. Unknown ids are ignored.
    pub fn with_only<S: AsRef<str>>(&self, ids: &[S]) -> Self {
        let wanted: HashSet<&str> = ids.iter().map(|s| s.as_ref()).collect();
        Self {
            boards: self
                .boards
                .iter()
                .filter(|b| wanted.contains(b.config.id.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Wire each board to the fetcher its strategy calls for.
    pub fn build_adapters(&self, deps: &AdapterDeps) -> Vec<Arc<dyn SourceAdapter>> {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(self.boards.len());

        for board in &self.boards {
            let fetcher: Arc<dyn PageFetcher> = match board.config.strategy {
                FetchStrategy::Http => match deps.proxy {
                    Some(ref proxy) => Arc::new(FallbackFetcher::new(
                        deps.http.clone(),
                        Some(proxy.clone()),
                    )),
                    None => deps.http.clone(),
                },
                FetchStrategy::RenderProxy => match deps.proxy {
                    Some(ref proxy) => proxy.clone(),
                    None => {
                        warn!(source = %board.config.id, "No render proxy configured, using plain HTTP");
                        deps.http.clone()
                    }
                },
                FetchStrategy::Browser => match deps.browser {
                    Some(ref session) => Arc::new(BrowserFetcher::new(session.clone())),
                    None => {
                        warn!(source = %board.config.id, "No browser session, skipping board");
                        continue;
                    }
                },
            };

            let fetcher = RateLimitedFetcher::new(
                fetcher,
                board.config.id.clone(),
                deps.rate_limiter.clone(),
            );
            adapters.push(Arc::new(BoardAdapter::new(
                board.config.clone(),
                fetcher,
                board.extractor.clone(),
            )));
        }

        adapters
    }
}

/// Built-in Korean job boards, primary board first.
pub fn default_boards() -> Vec<BoardConfig> {
    vec![
        BoardConfig::new(
            "saramin",
            "https://www.saramin.co.kr/zf_user/search/recruit?searchword={query}&recruitPage={page}&recruitPageCount={per_page}",
            ExtractorSpec::Css(SelectorSpec {
                item: "div.item_recruit".into(),
                title: "h2.job_tit a".into(),
                title_attr: Some("title".into()),
                company: "strong.corp_name a".into(),
                location: Some("div.job_condition span:nth-of-type(1)".into()),
                experience: Some("div.job_condition span:nth-of-type(2)".into()),
                education: Some("div.job_condition span:nth-of-type(3)".into()),
                link: None,
            }),
        )
        .with_display_name("사람인")
        .with_per_page_cap(40)
        .with_page_ceiling(5)
        .with_timeout(Duration::from_secs(20)),
        BoardConfig::new(
            "jobkorea",
            "https://www.jobkorea.co.kr/Search/?stext={query}&tabType=recruit&Page_No={page}",
            ExtractorSpec::Css(SelectorSpec {
                item: "li.list-post".into(),
                title: "div.post-list-info a.title".into(),
                title_attr: Some("title".into()),
                company: "div.post-list-corp a.name".into(),
                location: Some("p.option span.loc".into()),
                experience: Some("p.option span.exp".into()),
                education: Some("p.option span.edu".into()),
                link: None,
            }),
        )
        .with_display_name("잡코리아")
        .with_per_page_cap(40)
        .with_page_ceiling(3)
        .with_timeout(Duration::from_secs(20)),
        BoardConfig::new(
            "incruit",
            "https://search.incruit.com/list/search.asp?col=job&kw={query}&startno={offset}",
            ExtractorSpec::Css(SelectorSpec {
                item: "ul.c_row".into(),
                title: "div.cell_mid div.cl_top a".into(),
                title_attr: None,
                company: "div.cell_first a.cpname".into(),
                location: Some("div.cell_mid div.cl_md span:nth-of-type(3)".into()),
                experience: Some("div.cell_mid div.cl_md span:nth-of-type(1)".into()),
                education: Some("div.cell_mid div.cl_md span:nth-of-type(2)".into()),
                link: None,
            }),
        )
        .with_display_name("인크루트")
        .with_strategy(FetchStrategy::RenderProxy)
        .with_ready(Readiness::selector("div.cBbslist_contenst"))
        .with_per_page_cap(30)
        .with_page_ceiling(3)
        .with_timeout(Duration::from_secs(45)),
        // Infinite scroll with no page parameter, so one page is all there is
        BoardConfig::new(
            "wanted",
            "https://www.wanted.co.kr/search?query={query}&tab=position",
            ExtractorSpec::Css(SelectorSpec {
                item: r#"div[data-cy="job-card"]"#.into(),
                title: r#"strong[class*="JobCard_title"]"#.into(),
                title_attr: None,
                company: r#"span[class*="CompanyName"]"#.into(),
                location: Some(r#"span[class*="location"]"#.into()),
                experience: None,
                education: None,
                link: Some("a".into()),
            }),
        )
        .with_display_name("원티드")
        .with_strategy(FetchStrategy::Browser)
        .with_ready(Readiness::selector(r#"div[data-cy="job-card"]"#))
        .with_page_ceiling(1)
        .with_timeout(Duration::from_secs(60)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowserSession, MockFetcher};
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_default_boards_compile() {
        let registry = SourceRegistry::with_defaults().unwrap();
        assert_eq!(
            registry.ids(),
            vec![
                SourceId::new("saramin"),
                SourceId::new("jobkorea"),
                SourceId::new("incruit"),
                SourceId::new("wanted"),
            ]
        );
        assert!(registry.needs_browser());
    }

    #[test]
    fn test_default_ceilings_in_range() {
        for board in default_boards() {
            assert!((1..=5).contains(&board.page_ceiling), "{}", board.id);
            assert!((20..=60).contains(&board.per_page_cap), "{}", board.id);
        }
    }

    #[test]
    fn test_page_url_placeholders() {
        let board = BoardConfig::new(
            "b",
            "https://example.com/s?q={query}&p={page}&n={per_page}&o={offset}",
            ExtractorSpec::Css(SelectorSpec::default()),
        )
        .with_per_page_cap(30);

        assert_eq!(
            board.page_url("c++ 개발", 3),
            "https://example.com/s?q=c%2B%2B%20%EA%B0%9C%EB%B0%9C&p=3&n=30&o=60"
        );
    }

    #[test]
    fn test_duplicate_board_rejected() {
        let boards = vec![default_boards()[0].clone(), default_boards()[0].clone()];
        assert!(matches!(
            SourceRegistry::new(boards),
            Err(ConfigError::DuplicateBoard(_))
        ));
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let board = default_boards()[0].clone().with_page_ceiling(0);
        assert!(matches!(
            SourceRegistry::new(vec![board]),
            Err(ConfigError::InvalidBoard { .. })
        ));
    }

    #[test]
    fn test_bad_search_url_rejected() {
        let board = BoardConfig::new(
            "b",
            "not a url {query}",
            ExtractorSpec::Css(SelectorSpec {
                item: "li".into(),
                title: "a".into(),
                company: "span".into(),
                ..Default::default()
            }),
        );
        assert!(matches!(
            SourceRegistry::new(vec![board]),
            Err(ConfigError::InvalidSearchUrl { .. })
        ));
    }

    #[test]
    fn test_filters_preserve_priority() {
        let registry = SourceRegistry::with_defaults().unwrap();

        let only = registry.with_only(&["wanted", "saramin", "nope"]);
        assert_eq!(
            only.ids(),
            vec![SourceId::new("saramin"), SourceId::new("wanted")]
        );

        let no_browser = registry.without_browser();
        assert!(!no_browser.needs_browser());
        assert_eq!(no_browser.len(), 3);
    }

    #[test]
    fn test_browser_boards_skipped_without_session() {
        let registry = SourceRegistry::with_defaults().unwrap();
        let deps = AdapterDeps::new(Arc::new(MockFetcher::new()));

        let adapters = registry.build_adapters(&deps);
        let ids: Vec<_> = adapters.iter().map(|a| a.source().to_string()).collect();

        assert_eq!(ids, vec!["saramin", "jobkorea", "incruit"]);
    }

    #[test]
    fn test_browser_boards_built_with_session() {
        let registry = SourceRegistry::with_defaults().unwrap();
        let deps = AdapterDeps::new(Arc::new(MockFetcher::new()))
            .with_browser(Some(Arc::new(MockBrowserSession::new())));

        let adapters = registry.build_adapters(&deps);

        assert_eq!(adapters.len(), 4);
        assert_eq!(adapters[3].page_ceiling(), 1);
    }

    #[tokio::test]
    async fn test_rebuilt_adapters_share_board_quota() {
        let board = BoardConfig::new(
            "b",
            "https://b.test/s?q={query}&page={page}",
            ExtractorSpec::Css(SelectorSpec {
                item: "li".into(),
                title: "a".into(),
                company: "span".into(),
                ..Default::default()
            }),
        );
        let registry = SourceRegistry::new(vec![board]).unwrap();
        let fetcher = MockFetcher::new().with_default_html("<p></p>");
        let deps = AdapterDeps::new(Arc::new(fetcher.clone())).with_requests_per_second(1);

        let start = Instant::now();
        for _ in 0..2 {
            let adapters = registry.build_adapters(&deps);
            adapters[0]
                .fetch_page("dev", 1, &CancellationToken::new())
                .await;
        }

        assert!(start.elapsed() >= Duration::from_millis(900));
        assert_eq!(fetcher.call_count(), 2);
    }
}
