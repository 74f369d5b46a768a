//! The compose module renders the final llms.txt from checkpointed descriptions,
//! either as a fresh sorted index or by refreshing an existing document in place.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::blacklist::Blacklist;
use crate::checkpoint::{CheckpointEntry, CheckpointStore};
use crate::document::{IndexDocument, Node, escape_label};
use crate::target::normalize_url;

/// Label used for entries whose page title is unknown.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TitleFallback {
    /// Last non-empty path segment, or the host for a root page
    #[default]
    LastPathSegment,
    /// The URL itself
    Url,
}

impl TitleFallback {
    fn label(self, url: &str) -> String {
        match self {
            Self::Url => url.to_owned(),
            Self::LastPathSegment => url
                .trim_end_matches('/')
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or(url)
                .to_owned(),
        }
    }
}

/// Renders one index line, labelled with the title or else the URL.
///
/// Brackets in the label are escaped so the line parses back as an entry.
pub fn render_page_line(title: Option<&str>, url: &str, description: &str) -> String {
    format!(
        "[{}]({url}): {description}",
        escape_label(title.unwrap_or(url))
    )
}

/// Builds a fresh index from every checkpointed description.
///
/// Blacklisted URLs are dropped even when a stale entry exists. Entries are
/// sorted by URL and an entry whose description repeats an earlier one is
/// dropped, so the smallest URL keeps a shared description.
pub fn build_fresh(
    store: &CheckpointStore,
    blacklist: &Blacklist,
    fallback: TitleFallback,
) -> String {
    let mut entries: Vec<&CheckpointEntry> = store
        .entries()
        .filter(|entry| !blacklist.contains(&entry.url))
        .collect();
    entries.sort_by(|a, b| a.url.cmp(&b.url));

    let mut seen_descriptions = HashSet::new();
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen_descriptions.insert(entry.description.as_str()) {
            debug!(
                "Dropping {} as its description duplicates another page",
                entry.url
            );
            continue;
        }

        let label = match &entry.title {
            Some(title) => title.clone(),
            None => fallback.label(&entry.url),
        };
        lines.push(render_page_line(
            Some(label.as_str()),
            &entry.url,
            &entry.description,
        ));
    }

    let skipped = store.len() - lines.len();
    info!(
        "Composed {} entries, {skipped} excluded as blacklisted or duplicate",
        lines.len()
    );

    lines
        .iter()
        .map(|line| format!("{line}\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Refreshes the descriptions of an existing index from the store.
///
/// Only description fields of entries found in the store change; titles, text
/// nodes and node order are kept. Blacklisted entries keep their previous
/// description, and are removed instead when `drop_blacklisted` is set.
pub fn merge_into(
    document: &IndexDocument,
    store: &CheckpointStore,
    blacklist: &Blacklist,
    drop_blacklisted: bool,
) -> IndexDocument {
    let mut updated = 0;
    let nodes = document
        .nodes
        .iter()
        .filter_map(|node| match node {
            Node::Text(_) => Some(node.clone()),
            Node::Entry(entry) => {
                let url = normalize_url(&entry.url);
                if blacklist.contains(&url) {
                    return (!drop_blacklisted).then(|| node.clone());
                }

                let mut entry = entry.clone();
                if let Some(checkpointed) = store.get(&url)
                    && checkpointed.description != entry.description
                {
                    entry.set_description(&checkpointed.description);
                    updated += 1;
                }
                Some(Node::Entry(entry))
            }
        })
        .collect();

    info!(
        "Updated {updated} of {} descriptions in place",
        document.entry_count()
    );
    IndexDocument { nodes }
}

/// Writes the composed index, replacing any previous file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_output(output_path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(output_path)
        .with_context(|| format!("Failed to open {}", output_path.display()))?;
    file.write_all(content.as_bytes())?;

    info!("Wrote {}", output_path.display());
    Ok(())
}
