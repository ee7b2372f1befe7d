//! Page fetching.
//!
//! The crawl stages never talk to the network directly; they go through
//! [`Fetch`]. [`HttpFetcher`] is the production implementation on top of
//! `reqwest`. Politeness, redirects and timeouts are the HTTP client's job.

use crate::error::Result;
use crate::models::PageResponse;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Something that can turn a URL into a page.
pub trait Fetch {
    /// Fetch `url` and return the final response.
    ///
    /// The returned [`PageResponse::url`] is the address after redirects.
    async fn fetch(&self, url: &Url) -> Result<PageResponse>;
}

/// [`Fetch`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given user agent and per-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<PageResponse> {
        let t0 = Instant::now();
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response.error_for_status()?,
            Err(e) => {
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Request failed");
                return Err(e.into());
            }
        };

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(
            %final_url,
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(PageResponse {
            url: final_url,
            status,
            body,
        })
    }
}
