//! Plain HTTP fetcher for boards that render results server-side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use tracing::{debug, warn};

use super::{FetchRequest, PageFetcher, USER_AGENT};
use crate::error::{FetchError, FetchResult};

/// Body fragments that mean we got an interstitial instead of results.
const BOT_WALL_MARKERS: &[&str] = &[
    "cf-chl-bypass",
    "Attention Required",
    "Please wait while your request is being verified",
    "비정상적인 접근",
];

/// HTTP fetcher using reqwest with browser-like headers.
///
/// No JavaScript rendering. For boards that build their result list
/// client-side use `RenderProxyFetcher` or `BrowserFetcher`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(FetchError::network)?;

        Ok(Self { client })
    }

    /// Set a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn looks_like_bot_wall(body: &str) -> bool {
        BOT_WALL_MARKERS.iter().any(|marker| body.contains(marker))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        debug!(url = %request.url, "HTTP fetch starting");

        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: request.url.clone(),
                        after: request.timeout,
                    }
                } else {
                    FetchError::network(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            warn!(url = %request.url, status = %status, "Board refused request");
            return Err(FetchError::Blocked {
                url: request.url.clone(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let body = response.text().await.map_err(FetchError::network)?;

        if Self::looks_like_bot_wall(&body) {
            warn!(url = %request.url, "Anti-bot interstitial returned");
            return Err(FetchError::Blocked {
                url: request.url.clone(),
            });
        }

        // Static markup will not change on a second look
        if !request.ready.is_satisfied(&body) {
            debug!(
                url = %request.url,
                selector = ?request.ready.as_selector(),
                "Readiness marker absent in static response"
            );
        }

        Ok(body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_wall_detection() {
        assert!(HttpFetcher::looks_like_bot_wall(
            "<title>Attention Required! | Cloudflare</title>"
        ));
        assert!(!HttpFetcher::looks_like_bot_wall(
            r#"<div class="item_recruit">개발자</div>"#
        ));
    }

    #[test]
    fn test_new_builds_client() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.name(), "http");
    }
}
