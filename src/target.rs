//! Targets are the URLs a run has to describe, keyed by their normalized form.

use url::Url;

/// A URL slated for processing in a run.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Target {
    /// Normalized absolute URL, unique within a run.
    pub url: String,
    /// Title carried over from an existing index, if any.
    pub title: Option<String>,
    /// Position of the entry node in the existing index document.
    pub structural_index: Option<usize>,
}

impl Target {
    /// Creates a target for a crawled or listed URL, normalizing it.
    pub fn new(url: &str) -> Self {
        Self {
            url: normalize_url(url),
            title: None,
            structural_index: None,
        }
    }

    /// Attaches the title found in an existing index. Blank titles are ignored.
    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        let title = title.trim();
        if !title.is_empty() {
            self.title = Some(title.to_owned());
        }
        self
    }

    /// Attaches the node position of the entry in an existing index.
    #[must_use]
    pub fn at_node(mut self, index: usize) -> Self {
        self.structural_index = Some(index);
        self
    }
}

/// Normalizes a URL so that cosmetic differences do not create distinct keys.
///
/// Absolute URLs lose their fragment and get a lowercased host. Trailing slashes
/// are always removed, so `https://ex.com/docs/` and `https://ex.com/docs` collide.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let normalized = match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_owned(),
    };

    normalized.trim_end_matches('/').to_owned()
}
