//! The shared browser session used by browser-rendered boards.
//!
//! One session is launched per request and shared by every adapter in that
//! request. [`BrowserLease`] owns it for the request's lifetime and closes it
//! on every exit path, including errors, panics and dropped futures.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchResult};
use crate::fetch::{FetchRequest, USER_AGENT};

/// A running browser that can render pages.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate a fresh tab to the URL, wait for readiness, return the DOM.
    async fn render(&self, request: &FetchRequest) -> FetchResult<String>;

    /// Shut the browser down. Calls after the first are no-ops.
    async fn close(&self);
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> FetchResult<Arc<dyn BrowserSession>>;
}

/// Launch settings for headless Chrome.
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// Explicit Chrome binary; autodetected when None
    pub path: Option<PathBuf>,
    /// Browser exits after this long without CDP traffic
    pub idle_timeout: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            path: None,
            idle_timeout: Duration::from_secs(180),
        }
    }
}

pub struct HeadlessChromeLauncher {
    config: ChromeConfig,
}

impl HeadlessChromeLauncher {
    pub fn new(config: ChromeConfig) -> Self {
        Self { config }
    }

    fn launch_blocking(config: ChromeConfig) -> FetchResult<Browser> {
        let user_agent = OsString::from(format!("--user-agent={}", USER_AGENT));
        let no_automation = OsString::from("--disable-blink-features=AutomationControlled");
        let lang = OsString::from("--lang=ko-KR");

        let options = LaunchOptions {
            headless: true,
            path: config.path,
            idle_browser_timeout: config.idle_timeout,
            args: vec![
                user_agent.as_os_str(),
                no_automation.as_os_str(),
                lang.as_os_str(),
            ],
            ..Default::default()
        };

        Browser::new(options).map_err(|e| FetchError::Browser(format!("launch failed: {}", e)))
    }
}

impl Default for HeadlessChromeLauncher {
    fn default() -> Self {
        Self::new(ChromeConfig::default())
    }
}

#[async_trait]
impl BrowserLauncher for HeadlessChromeLauncher {
    async fn launch(&self) -> FetchResult<Arc<dyn BrowserSession>> {
        let config = self.config.clone();
        let browser = tokio::task::spawn_blocking(move || Self::launch_blocking(config))
            .await
            .map_err(|e| FetchError::Browser(format!("launch task failed: {}", e)))??;

        info!("Headless browser launched");
        Ok(Arc::new(HeadlessChromeSession {
            browser: Mutex::new(Some(Arc::new(browser))),
        }))
    }
}

/// A headless Chrome process driven over CDP.
///
/// `headless_chrome` is synchronous, so every call runs on a blocking thread.
pub struct HeadlessChromeSession {
    browser: Mutex<Option<Arc<Browser>>>,
}

impl HeadlessChromeSession {
    fn current(&self) -> FetchResult<Arc<Browser>> {
        self.browser
            .lock()
            .map_err(|_| FetchError::Browser("session lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| FetchError::Browser("session already closed".to_string()))
    }

    fn render_blocking(browser: &Browser, request: &FetchRequest) -> FetchResult<String> {
        let started = Instant::now();
        let tab = browser.new_tab().map_err(browser_err)?;
        tab.set_default_timeout(request.timeout);

        let rendered = (|| {
            tab.navigate_to(&request.url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;

            if let Some(selector) = request.ready.as_selector() {
                // Navigation and readiness share one `timeout`. An empty result
                // page may never show the container, so running out is not an error.
                let remaining = request.timeout.saturating_sub(started.elapsed());
                if let Err(e) = tab.wait_for_element_with_custom_timeout(selector, remaining) {
                    debug!(url = %request.url, selector, error = %e, "Readiness wait expired");
                }
            }

            tab.get_content().map_err(browser_err)
        })();

        if let Err(e) = tab.close(false) {
            debug!(url = %request.url, error = %e, "Failed to close tab");
        }

        rendered
    }
}

#[async_trait]
impl BrowserSession for HeadlessChromeSession {
    async fn render(&self, request: &FetchRequest) -> FetchResult<String> {
        let browser = self.current()?;
        let request = request.clone();

        tokio::task::spawn_blocking(move || Self::render_blocking(&browser, &request))
            .await
            .map_err(|e| FetchError::Browser(format!("render task failed: {}", e)))?
    }

    async fn close(&self) {
        let browser = match self.browser.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(browser) = browser {
            // Dropping the last handle kills the Chrome process
            let _ = tokio::task::spawn_blocking(move || drop(browser)).await;
            info!("Headless browser closed");
        }
    }
}

fn browser_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// Request-scoped owner of the shared browser session.
///
/// Call [`BrowserLease::release`] on the happy path. If the lease is dropped
/// without being released, the session is closed on the current runtime.
pub struct BrowserLease {
    session: Option<Arc<dyn BrowserSession>>,
}

impl BrowserLease {
    /// Launch a session for this request.
    pub async fn acquire(launcher: &dyn BrowserLauncher) -> FetchResult<Self> {
        let session = launcher.launch().await?;
        Ok(Self {
            session: Some(session),
        })
    }

    /// A lease for a request that needs no browser.
    pub fn empty() -> Self {
        Self { session: None }
    }

    pub fn session(&self) -> Option<Arc<dyn BrowserSession>> {
        self.session.clone()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Close the session now and wait for it.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Browser lease dropped without release, closing in background");
                handle.spawn(async move { session.close().await });
            }
            Err(_) => warn!("Browser lease dropped outside a runtime, session not closed"),
        }
    }
}
