//! The blacklist module loads URLs that must never be summarized or listed.

use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::target::normalize_url;

/// Set of normalized URLs excluded from processing and from fresh output.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    urls: HashSet<String>,
}

impl Blacklist {
    /// Loads a blacklist file with one URL per line.
    ///
    /// Blank lines and lines starting with `#` are ignored. A missing file yields
    /// an empty blacklist with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Blacklist file {} not found, nothing excluded", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blacklist file: {}", path.display()))?;
        let blacklist = Self::parse(&content);
        info!(
            "Loaded {} blacklisted URLs from {}",
            blacklist.len(),
            path.display()
        );

        Ok(blacklist)
    }

    /// Parses blacklist content already held in memory.
    pub fn parse(content: &str) -> Self {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect()
    }

    /// Tells whether the URL is excluded. The URL is normalized before the lookup.
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(&normalize_url(url))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Blacklist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            urls: iter
                .into_iter()
                .map(|url| normalize_url(url.as_ref()))
                .collect(),
        }
    }
}
