//! The checkpoint module keeps the durable record of finished summaries.
//!
//! The whole store lives in memory during a run and is written to a single JSON
//! file keyed by URL, so a later run can skip every URL already present.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::target::normalize_url;

/// Persisted record for one processed URL.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Normalized URL. Stored as the map key on disk.
    #[serde(skip)]
    pub url: String,
    /// Generated one-line description.
    pub description: String,
    /// Page title used to label the entry in a fresh index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the description was produced. Diagnostics only.
    #[serde(default = "Utc::now")]
    pub processed_at: DateTime<Utc>,
}

/// In-memory view of the checkpoint file with an explicit flush.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: HashMap<String, CheckpointEntry>,
}

impl CheckpointStore {
    /// Creates an empty store that will be flushed to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Loads the store from `path`.
    ///
    /// A missing, unreadable or unparseable file gives an empty store: a broken
    /// checkpoint only costs a fresh run, it never blocks one. Malformed records
    /// are skipped one by one, the rest of the file is kept.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::empty(path);

        if !store.path.exists() {
            debug!("No checkpoint at {}, starting fresh", store.path.display());
            return store;
        }

        match Self::read_entries(&store.path) {
            Ok(entries) => store.entries = entries,
            Err(err) => warn!(
                "Ignoring unreadable checkpoint {}: {err:#}",
                store.path.display()
            ),
        }

        store
    }

    fn read_entries(path: &Path) -> Result<HashMap<String, CheckpointEntry>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let records: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&content).context("Checkpoint is not a valid JSON map")?;

        let mut entries = HashMap::with_capacity(records.len());
        for (url, record) in records {
            match serde_json::from_value::<CheckpointEntry>(record) {
                Ok(mut entry) => {
                    let url = normalize_url(&url);
                    entry.url.clone_from(&url);
                    entries.insert(url, entry);
                }
                Err(err) => warn!("Skipping malformed checkpoint record for {url}: {err}"),
            }
        }

        Ok(entries)
    }

    /// Path of the durable checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up the entry for a URL. The URL is normalized first.
    pub fn get(&self, url: &str) -> Option<&CheckpointEntry> {
        self.entries.get(&normalize_url(url))
    }

    /// Tells whether the URL has already been summarized.
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Inserts or replaces the entry for a URL and returns the stored entry.
    ///
    /// Upserting an identical description and title is a no-op, including the
    /// timestamp, so repeating a call leaves the store unchanged.
    pub fn upsert(
        &mut self,
        url: &str,
        description: &str,
        title: Option<&str>,
    ) -> &CheckpointEntry {
        let url = normalize_url(url);
        let title = title.map(str::to_owned);

        let entry = self
            .entries
            .entry(url.clone())
            .or_insert_with(|| CheckpointEntry {
                url,
                description: String::new(),
                title: None,
                processed_at: Utc::now(),
            });

        if entry.description != description || entry.title != title {
            entry.description = description.to_owned();
            entry.title = title;
            entry.processed_at = Utc::now();
        }

        entry
    }

    /// Iterates over all entries in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = &CheckpointEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the whole store to disk.
    ///
    /// The content goes to a temporary sibling first and is renamed over the
    /// checkpoint, so a crash mid-write leaves the previous checkpoint intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be
    /// written or renamed. The in-memory entries are kept either way.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let sorted: BTreeMap<&str, &CheckpointEntry> = self
            .entries
            .iter()
            .map(|(url, entry)| (url.as_str(), entry))
            .collect();
        let content = serde_json::to_string_pretty(&sorted)?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        std::fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(
            "Flushed {} checkpoint entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
