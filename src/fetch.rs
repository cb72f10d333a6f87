use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::metrics::PipelineMetrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// "Fetch a URL, get its text" capability used by every scraper.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct ReqwestFetchClient {
    client: reqwest::Client,
}

impl ReqwestFetchClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.http_timeout(), &config.http.user_agent)
    }
}

#[async_trait]
impl FetchClient for ReqwestFetchClient {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

/// Canned responses keyed by URL. Unknown URLs fail like a 404 would.
/// Records every URL asked for.
#[derive(Default)]
pub struct StaticFetchClient {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FetchClient for StaticFetchClient {
    async fn fetch(&self, url: &str) -> Result<String> {
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_string());
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::Parse(format!("no page for {}", url)))
    }
}

/// Fetch one page. A failure is logged and reported as `Ok(None)` so the
/// caller skips the page; only cancellation is an error.
pub async fn fetch_page(
    client: &dyn FetchClient,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    debug!("Fetching {}", url);
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScraperError::Cancelled),
        outcome = client.fetch(url) => outcome,
    };
    match outcome {
        Ok(body) => Ok(Some(body)),
        Err(e) => {
            warn!("Failed to fetch {}: {}", url, e);
            PipelineMetrics::record_fetch_error();
            Ok(None)
        }
    }
}

/// Politeness pause between requests. Returns `Cancelled` as soon as the
/// token fires.
pub async fn polite_delay(delay_ms: u64, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ScraperError::Cancelled);
    }
    if delay_ms == 0 {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScraperError::Cancelled),
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(()),
    }
}
