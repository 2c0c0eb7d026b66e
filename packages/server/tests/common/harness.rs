//! Test harness: the real router wired to mock fetchers and browsers.
//!
//! Requests go through `tower::ServiceExt::oneshot`, so no port is bound.

use std::sync::Arc;
use std::time::Duration;

use aggregator::testing::{MockBrowserLauncher, MockFetcher};
use aggregator::{BoardConfig, ExtractorSpec, FetchStrategy, SelectorSpec, SourceRegistry};
use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use server_core::kernel::{SearchSettings, ServerDeps};
use server_core::server::build_app;
use tower::ServiceExt;

pub const QUERY: &str = "개발자";

pub const LOCAL_CARDS: &str = r#"
<ul>
  <li class="job"><a class="t" href="/jobs/1">백엔드 개발자</a><span class="c">ACME</span><span class="l">서울 강남구</span></li>
  <li class="job"><a class="t" href="/jobs/2">프론트엔드 개발자</a><span class="c">Globex</span><span class="l">부산</span></li>
</ul>
"#;

pub const RENDERED_CARDS: &str = r#"
<ul>
  <li class="job"><a class="t" href="https://rendered.test/jobs/9">데이터 개발자</a><span class="c">Initech</span><span class="l">서울 마포구</span></li>
</ul>
"#;

const EMPTY_PAGE: &str = "<html><body><p>검색 결과가 없습니다</p></body></html>";

fn cards() -> ExtractorSpec {
    ExtractorSpec::Css(SelectorSpec {
        item: "li.job".into(),
        title: "a.t".into(),
        company: "span.c".into(),
        location: Some("span.l".into()),
        ..Default::default()
    })
}

/// Server-rendered board answering page 1 with [`LOCAL_CARDS`].
pub fn local_board() -> BoardConfig {
    BoardConfig::new("local", "https://local.test/search?q={query}&page={page}", cards())
}

/// Board with no canned pages; every fetch gets a 404.
pub fn dead_board() -> BoardConfig {
    BoardConfig::new("dead", "https://dead.test/search?q={query}&page={page}", cards())
}

/// Browser-rendered board, one page.
pub fn browser_board() -> BoardConfig {
    BoardConfig::new("rendered", "https://rendered.test/list?q={query}", cards())
        .with_strategy(FetchStrategy::Browser)
        .with_page_ceiling(1)
}

/// Fast limits so tests are not paced by the politeness quota.
pub fn test_settings() -> SearchSettings {
    SearchSettings {
        requests_per_second: 100,
        ..SearchSettings::default()
    }
}

pub struct TestHarness {
    pub app: Router,
    pub fetcher: MockFetcher,
    pub launcher: MockBrowserLauncher,
}

impl TestHarness {
    /// Only the local board.
    pub fn new() -> Self {
        Self::with_boards(vec![local_board()], MockBrowserLauncher::new())
    }

    pub fn with_boards(boards: Vec<BoardConfig>, launcher: MockBrowserLauncher) -> Self {
        Self::build(boards, launcher, test_settings())
    }

    pub fn build(
        boards: Vec<BoardConfig>,
        launcher: MockBrowserLauncher,
        settings: SearchSettings,
    ) -> Self {
        // Uses try_init() to avoid panicking if already initialized.
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let local = local_board();
        let fetcher = MockFetcher::new()
            .with_page(local.page_url(QUERY, 1), LOCAL_CARDS)
            .with_page(local.page_url(QUERY, 2), EMPTY_PAGE)
            .with_page(local.page_url(QUERY, 3), EMPTY_PAGE);

        let registry = SourceRegistry::new(boards).expect("test boards are valid");
        let deps = ServerDeps::new(
            registry,
            Arc::new(fetcher.clone()),
            Arc::new(launcher.clone()),
        )
        .with_settings(settings);

        Self {
            app: build_app(deps),
            fetcher,
            launcher,
        }
    }

    /// Every fetch sleeps `delay` before answering.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        // Mock state is shared between clones, so the router sees the delay too
        let _ = self.fetcher.clone().with_delay(delay);
        self
    }

    pub async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_raw(&self, path: &str, body: impl Into<String>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.into()))
            .unwrap();
        self.send(request).await
    }

    pub async fn search(&self, body: Value) -> (StatusCode, Value) {
        self.post_raw("/api/scrape/jobs", body.to_string()).await
    }

    pub fn search_request(&self, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/scrape/jobs")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
