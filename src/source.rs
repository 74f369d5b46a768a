//! The source module resolves the ordered list of targets for a run, either by
//! crawling seed URLs or by reading the entries of an existing index.

use anyhow::{Context, Result};
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use url::Url;

use crate::crawl::Crawler;
use crate::document::IndexDocument;
use crate::fetch::{HttpFetcher, load_index_text};
use crate::pipeline::Source;
use crate::target::Target;

/// Targets of a run and what was learned while resolving them.
#[derive(Debug, Default)]
pub struct ResolvedSources {
    /// Deduplicated targets in discovery or file order.
    pub targets: Vec<Target>,
    /// HTML already retrieved by the crawler, keyed by target URL.
    pub pages: HashMap<String, String>,
    /// Parsed existing index, in existing-index mode.
    pub document: Option<IndexDocument>,
}

impl ResolvedSources {
    /// Adds a target unless its URL was already seen. Returns whether it was kept.
    fn push(&mut self, seen: &mut HashSet<String>, target: Target) -> bool {
        if !seen.insert(target.url.clone()) {
            debug!("Dropping duplicate target {}", target.url);
            return false;
        }
        self.targets.push(target);
        true
    }
}

/// Resolves the targets of `source`.
///
/// # Errors
///
/// Returns an error if a seed is not an absolute URL or the existing index
/// cannot be loaded. A seed whose crawl fails is logged and skipped.
pub async fn resolve(
    source: &Source,
    crawler: &dyn Crawler,
    fetcher: &HttpFetcher,
) -> Result<ResolvedSources> {
    let resolved = match source {
        Source::Urls { seeds, max_depth } => resolve_seeds(seeds, *max_depth, crawler).await?,
        Source::ExistingIndex { location } => {
            let text = load_index_text(location, fetcher).await?;
            resolve_document(IndexDocument::parse(&text))
        }
    };

    info!("Resolved {} targets", resolved.targets.len());
    Ok(resolved)
}

async fn resolve_seeds(
    seeds: &[String],
    max_depth: usize,
    crawler: &dyn Crawler,
) -> Result<ResolvedSources> {
    let mut resolved = ResolvedSources::default();
    let mut seen = HashSet::new();

    for seed in seeds {
        let seed_url = Url::parse(seed).with_context(|| format!("Invalid seed URL: {seed}"))?;
        let pages = match crawler.crawl(&seed_url, max_depth).await {
            Ok(pages) => pages,
            Err(err) => {
                error!("Failed to crawl {seed}: {err:#}");
                continue;
            }
        };

        info!("Loaded {} pages from {seed}", pages.len());
        for page in pages {
            let target = Target::new(&page.url);
            let url = target.url.clone();
            if resolved.push(&mut seen, target) {
                resolved.pages.insert(url, page.html);
            }
        }
    }

    Ok(resolved)
}

/// Turns the entries of an index document into targets, keeping file order.
pub fn resolve_document(document: IndexDocument) -> ResolvedSources {
    let mut resolved = ResolvedSources::default();
    let mut seen = HashSet::new();

    for (index, entry) in document.entries() {
        let target = Target::new(&entry.url)
            .with_title(&entry.label())
            .at_node(index);
        resolved.push(&mut seen, target);
    }

    resolved.document = Some(document);
    resolved
}
