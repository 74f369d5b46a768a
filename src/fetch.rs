//! The fetch module retrieves single pages and existing index files over HTTP
//! or from the local filesystem.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::BoxFuture;
use crate::constants::USER_AGENT;

/// Retrieves the HTML of one page.
pub trait PageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Fetches pages with a shared reqwest client.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.get_text(url))
    }
}

/// Loads the raw text of an existing index from an http(s) URL or a local path.
///
/// # Errors
///
/// Returns an error if the resource cannot be downloaded or read.
pub async fn load_index_text(location: &str, fetcher: &HttpFetcher) -> Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return fetcher
            .get_text(location)
            .await
            .with_context(|| format!("Failed to download existing index {location}"));
    }

    tokio::fs::read_to_string(location)
        .await
        .with_context(|| format!("Failed to read existing index {location}"))
}
