//! Configurable fakes for fetchers, adapters and browsers.
//!
//! All mocks are cheap to clone and share their state, so a test can hand one
//! clone to the code under test and keep another to inspect calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::adapter::{PageOutcome, SourceAdapter};
use crate::browser::{BrowserLauncher, BrowserSession};
use crate::error::{AdapterFailure, FetchError, FetchResult};
use crate::fetch::{FetchRequest, PageFetcher};
use crate::model::{JobListing, SourceId};

type FailFn = Arc<dyn Fn(&str) -> FetchError + Send + Sync>;

#[derive(Default)]
struct FetcherState {
    pages: HashMap<String, String>,
    default_html: Option<String>,
    fail: Option<FailFn>,
    delay: Option<Duration>,
    requested: Vec<String>,
}

/// Page fetcher serving canned HTML.
///
/// Unknown URLs get the default HTML when one is set, otherwise HTTP 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<RwLock<FetcherState>>,
    panic_on_fetch: Arc<AtomicBool>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.state
            .write()
            .unwrap()
            .pages
            .insert(url.into(), html.into());
        self
    }

    pub fn with_default_html(self, html: impl Into<String>) -> Self {
        self.state.write().unwrap().default_html = Some(html.into());
        self
    }

    /// Fail every fetch with the error built from the requested URL.
    pub fn fail_with<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> FetchError + Send + Sync + 'static,
    {
        self.state.write().unwrap().fail = Some(Arc::new(f));
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.write().unwrap().delay = Some(delay);
        self
    }

    pub fn panic_on_fetch(self) -> Self {
        self.panic_on_fetch.store(true, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().requested.len()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.state.read().unwrap().requested.clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        let delay = {
            let mut state = self.state.write().unwrap();
            state.requested.push(request.url.clone());
            state.delay
        };

        if self.panic_on_fetch.load(Ordering::SeqCst) {
            panic!("mock fetcher asked to panic");
        }

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().unwrap();
        if let Some(fail) = &state.fail {
            return Err(fail(&request.url));
        }
        state
            .pages
            .get(&request.url)
            .or(state.default_html.as_ref())
            .cloned()
            .ok_or_else(|| FetchError::Http {
                status: 404,
                url: request.url.clone(),
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
struct AdapterState {
    pages: HashMap<u32, Vec<JobListing>>,
    failures: HashMap<u32, String>,
    always_fail: Option<String>,
    delay: Option<Duration>,
    calls: Vec<u32>,
}

/// Source adapter with scripted per-page outcomes.
///
/// Pages with no script return an empty listing, which ends pagination.
#[derive(Clone)]
pub struct MockAdapter {
    source: SourceId,
    ceiling: u32,
    state: Arc<RwLock<AdapterState>>,
}

impl MockAdapter {
    pub fn new(source: &str) -> Self {
        Self {
            source: SourceId::new(source),
            ceiling: 3,
            state: Arc::default(),
        }
    }

    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_page(self, page: u32, jobs: Vec<JobListing>) -> Self {
        self.state.write().unwrap().pages.insert(page, jobs);
        self
    }

    /// `count` distinct complete listings on `page`.
    pub fn with_generated_page(self, page: u32, count: usize) -> Self {
        let jobs = (0..count)
            .map(|i| {
                JobListing::new(
                    self.source.clone(),
                    format!("{} 개발자 {}-{}", self.source, page, i),
                    format!("회사 {}", i),
                )
                .with_link(format!("https://{}.example.com/jobs/{}/{}", self.source, page, i))
            })
            .collect();
        self.with_page(page, jobs)
    }

    pub fn failing_on(self, page: u32, reason: impl Into<String>) -> Self {
        self.state
            .write()
            .unwrap()
            .failures
            .insert(page, reason.into());
        self
    }

    pub fn always_failing(self, reason: impl Into<String>) -> Self {
        self.state.write().unwrap().always_fail = Some(reason.into());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.write().unwrap().delay = Some(delay);
        self
    }

    /// Pages requested so far, in order.
    pub fn calls(&self) -> Vec<u32> {
        self.state.read().unwrap().calls.clone()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source(&self) -> &SourceId {
        &self.source
    }

    fn page_ceiling(&self) -> u32 {
        self.ceiling
    }

    async fn fetch_page(&self, _query: &str, page: u32, cancel: &CancellationToken) -> PageOutcome {
        let delay = {
            let mut state = self.state.write().unwrap();
            state.calls.push(page);
            state.delay
        };

        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return PageOutcome::Failed(AdapterFailure::new(page, FetchError::Cancelled.to_string()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let state = self.state.read().unwrap();
        if let Some(reason) = state.always_fail.as_ref().or(state.failures.get(&page)) {
            return PageOutcome::Failed(AdapterFailure::new(page, reason.clone()));
        }
        PageOutcome::Listings(state.pages.get(&page).cloned().unwrap_or_default())
    }
}

/// Browser session returning fixed HTML.
#[derive(Clone)]
pub struct MockBrowserSession {
    html: Arc<RwLock<String>>,
    never_ready: Arc<AtomicBool>,
    renders: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockBrowserSession {
    pub fn new() -> Self {
        Self::sharing_closes(Arc::default())
    }

    fn sharing_closes(closes: Arc<AtomicUsize>) -> Self {
        Self {
            html: Arc::new(RwLock::new("<html><body></body></html>".to_string())),
            never_ready: Arc::default(),
            renders: Arc::default(),
            closes,
        }
    }

    pub fn with_html(self, html: impl Into<String>) -> Self {
        *self.html.write().unwrap() = html.into();
        self
    }

    /// Readiness selectors never match: each render with one waits out the
    /// request's whole `timeout`, then returns the HTML as it stands.
    pub fn never_ready(self) -> Self {
        self.never_ready.store(true, Ordering::SeqCst);
        self
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockBrowserSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn render(&self, request: &FetchRequest) -> FetchResult<String> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self.never_ready.load(Ordering::SeqCst) && request.ready.as_selector().is_some() {
            tokio::time::sleep(request.timeout).await;
        }
        Ok(self.html.read().unwrap().clone())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Launcher handing out [`MockBrowserSession`]s, or failing every launch.
#[derive(Clone, Default)]
pub struct MockBrowserLauncher {
    failure: Option<String>,
    html: Option<String>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockBrowserLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// HTML every launched session renders.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Closes across every session this launcher produced.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockBrowserLauncher {
    async fn launch(&self) -> FetchResult<Arc<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(FetchError::Browser(reason.clone()));
        }

        let mut session = MockBrowserSession::sharing_closes(self.closes.clone());
        if let Some(html) = &self.html {
            session = session.with_html(html.clone());
        }
        Ok(Arc::new(session))
    }
}
