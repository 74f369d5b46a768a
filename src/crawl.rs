//! The crawl module expands seed URLs into pages using the spider crawler.

extern crate spider;

use anyhow::{Context, Result};
use log::{info, warn};
use spider::configuration::Configuration;
use spider::website::Website;
use url::Url;

use crate::LocalBoxFuture;
use crate::constants::USER_AGENT;

/// A page produced by a crawl.
#[derive(Clone, Debug)]
pub struct CrawledPage {
    pub url: String,
    pub html: String,
}

/// Expands a seed URL into the pages reachable within `max_depth`.
///
/// Depth semantics belong to the implementation; callers pass the bound through.
/// A crawl cannot be resumed, it is simply started again.
pub trait Crawler {
    fn crawl<'a>(
        &'a self,
        seed: &'a Url,
        max_depth: usize,
    ) -> LocalBoxFuture<'a, Result<Vec<CrawledPage>>>;
}

/// Crawler backed by `spider`, staying on the seed's host.
#[derive(Clone, Debug)]
pub struct SpiderCrawler {
    /// Delay between requests in milliseconds
    pub delay: u64,
    /// Number of concurrent requests
    pub concurrency: usize,
}

impl Default for SpiderCrawler {
    fn default() -> Self {
        Self {
            delay: 250,
            concurrency: 1,
        }
    }
}

impl SpiderCrawler {
    async fn crawl_website(&self, seed: &Url, max_depth: usize) -> Result<Vec<CrawledPage>> {
        let config = Configuration::new()
            .with_user_agent(Some(USER_AGENT))
            .with_subdomains(false)
            .with_redirect_limit(3)
            .with_retry(1)
            .with_depth(max_depth)
            .with_respect_robots_txt(true)
            .with_delay(self.delay)
            .with_concurrency_limit(Some(self.concurrency))
            .build();

        let mut website = Website::new(seed.as_str()).with_config(config).build()?;

        let mut receiver = website
            .subscribe(888)
            .context("Unable to create receiver.")?;

        let handle = tokio::spawn(async move {
            let mut pages = Vec::new();
            while let Ok(page) = receiver.recv().await {
                if !page.status_code.is_success() {
                    warn!("Skipping {} as {}", page.get_url(), page.status_code);
                    continue;
                }

                info!("Crawled {}", page.get_url());
                pages.push(CrawledPage {
                    url: page.get_url().to_string(),
                    html: page.get_html(),
                });
            }
            pages
        });

        info!("Starting crawl on {seed} with depth {max_depth}");
        website.crawl().await;
        website.unsubscribe();

        handle.await.context("Crawl receiver task failed")
    }
}

impl Crawler for SpiderCrawler {
    fn crawl<'a>(
        &'a self,
        seed: &'a Url,
        max_depth: usize,
    ) -> LocalBoxFuture<'a, Result<Vec<CrawledPage>>> {
        Box::pin(self.crawl_website(seed, max_depth))
    }
}
