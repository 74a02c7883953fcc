//! HTTP resource fetcher with retry, redirect following, and size caps.
//!
//! Downloads run strictly one at a time. A resource that cannot be fetched
//! degrades to "absent" and never fails the run.

mod response;
mod retry;
mod user_agent;

pub use response::{FetchedResource, FetchedResources};
pub use retry::RetryPolicy;
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, REFERER,
};
use reqwest::{redirect, Client};
use tracing::{info, warn};

use crate::error::{FetchError, PackError};
use crate::resources::ResourceKind;
use crate::utils::{format_size, url_tail};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Default per-resource body cap (10 MiB).
pub const DEFAULT_MAX_RESOURCE_BYTES: u64 = 10 * 1024 * 1024;
/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Builder for [`ResourceFetcher`].
#[derive(Debug, Clone)]
pub struct ResourceFetcherBuilder {
    user_agent: Option<String>,
    referer: Option<String>,
    proxy: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    max_bytes: u64,
}

impl Default for ResourceFetcherBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            referer: None,
            proxy: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            max_bytes: DEFAULT_MAX_RESOURCE_BYTES,
        }
    }
}

impl ResourceFetcherBuilder {
    /// User agent config value (see [`resolve_user_agent`]).
    pub fn user_agent(mut self, ua: Option<&str>) -> Self {
        self.user_agent = ua.map(str::to_string);
        self
    }

    /// Referer sent with every request, normally the page being packed.
    pub fn referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn build(self) -> Result<ResourceFetcher, PackError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(ref referer) = self.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| PackError::Config(format!("invalid referer '{}': {}", referer, e)))?;
            headers.insert(REFERER, value);
        }

        let user_agent = resolve_user_agent(self.user_agent.as_deref());
        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(self.timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(ref proxy) = self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(ResourceFetcher {
            client: builder.build()?,
            retry: self.retry,
            timeout: self.timeout,
            max_bytes: self.max_bytes,
        })
    }
}

/// HTTP downloader for page resources.
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    client: Client,
    retry: RetryPolicy,
    timeout: Duration,
    max_bytes: u64,
}

impl ResourceFetcher {
    pub fn builder() -> ResourceFetcherBuilder {
        ResourceFetcherBuilder::default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One attempt, no retries.
    pub async fn fetch_once(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let map_err = |e: reqwest::Error| FetchError::from_reqwest(e, self.timeout);

        let mut response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = response.url().to_string();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_err)? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(FetchError::Empty);
        }

        Ok(FetchedResource {
            url: url.to_string(),
            final_url,
            content_type,
            body,
        })
    }

    /// Fetch with the retry policy; returns the last error when exhausted.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(resource) => return Ok(resource),
                Err(e) if e.is_retryable() && self.retry.has_next(attempt) => {
                    info!(
                        "   Retry {}/{} for {} ({})",
                        attempt + 1,
                        self.retry.max_attempts,
                        url_tail(url, 40),
                        e
                    );
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort fetch: failures are logged and become `None`.
    pub async fn fetch(&self, url: &str) -> Option<FetchedResource> {
        match self.fetch_with_retry(url).await {
            Ok(resource) => Some(resource),
            Err(e) => {
                warn!("   {} for {}", e, url);
                None
            }
        }
    }

    /// Fetch the page itself. Unlike resources, failure here is fatal.
    pub async fn get_page(&self, url: &str) -> Result<FetchedResource, PackError> {
        self.fetch_with_retry(url)
            .await
            .map_err(|source| PackError::PageFetch {
                url: url.to_string(),
                source,
            })
    }

    /// Download `urls` one by one, in order.
    ///
    /// `limit` caps how many URLs are attempted. Stylesheets and scripts
    /// whose body is only whitespace count as failures.
    pub async fn fetch_all(
        &self,
        kind: ResourceKind,
        urls: &[String],
        limit: Option<usize>,
        show_progress: bool,
    ) -> FetchedResources {
        let urls = match limit {
            Some(max) if urls.len() > max => {
                warn!(
                    "{}: fetching first {} of {} (limit reached)",
                    kind.label(),
                    max,
                    urls.len()
                );
                &urls[..max]
            }
            _ => urls,
        };

        let mut fetched = FetchedResources::new();
        let bar = progress_bar(kind, urls.len(), show_progress);

        for (i, url) in urls.iter().enumerate() {
            info!("   [{}/{}] {}", i + 1, urls.len(), url_tail(url, 60));
            bar.set_message(url_tail(url, 50));

            match self.fetch(url).await {
                Some(resource) if kind.is_text() && resource.text().trim().is_empty() => {
                    warn!("   Empty body for {}", url);
                    fetched.record_failure();
                }
                Some(resource) => {
                    info!("   Downloaded {}", format_size(resource.len()));
                    fetched.insert(resource);
                }
                None => fetched.record_failure(),
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        fetched
    }
}

fn progress_bar(kind: ResourceKind, total: usize, visible: bool) -> ProgressBar {
    if !visible || total == 0 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:<10} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar.set_prefix(kind.label());
    bar
}
