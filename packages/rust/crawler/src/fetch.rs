//! The fetch capability: one GET, redirects followed, status surfaced.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use apiscout_shared::{ApiScoutError, FetchConfig, Result};

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// A completed HTTP exchange.
///
/// Non-2xx responses are still responses; only transport failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// URL after redirects.
    pub final_url: Url,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the declared content type is JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }
}

/// Anything that can GET a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &Url) -> Result<FetchResponse>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client with the configured user agent and timeout.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Timeout-only constructor for callers without a full config.
    pub fn with_timeout(user_agent: &str, timeout: Duration) -> Result<Self> {
        Self::new(&FetchConfig {
            user_agent: user_agent.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn get(&self, url: &Url) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ApiScoutError::Network(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| ApiScoutError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(status, bytes = body.len(), "fetched");

        Ok(FetchResponse {
            status,
            content_type,
            body,
            final_url,
        })
    }
}
