use std::sync::Arc;

use async_trait::async_trait;

use super::{FetchRequest, PageFetcher};
use crate::browser::BrowserSession;
use crate::error::FetchResult;

/// Renders pages through the request's shared browser session.
pub struct BrowserFetcher {
    session: Arc<dyn BrowserSession>,
}

impl BrowserFetcher {
    pub fn new(session: Arc<dyn BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<String> {
        self.session.render(request).await
    }

    fn name(&self) -> &str {
        "browser"
    }
}
