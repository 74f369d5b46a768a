//! The driver module runs fetch, extraction and summarization for every target
//! and records the results in the checkpoint store.
//!
//! Work is spread over a bounded pool of tokio tasks. All completions travel over
//! one channel to the coordinating loop, which is the only place that mutates the
//! store, writes per-page files and flushes.

use anyhow::{Result, bail};
use log::{debug, error, info, warn};
use scraper::Selector as ScraperSelector;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use url::Url;

use crate::blacklist::Blacklist;
use crate::checkpoint::CheckpointStore;
use crate::compose::render_page_line;
use crate::constants::FLUSH_INTERVAL;
use crate::extract::{Extractor, extract_article};
use crate::fetch::PageFetcher;
use crate::summarize::{Summarizer, clean_summary};
use crate::target::Target;

/// Final state of a target after a run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TargetState {
    SkippedBlacklist,
    SkippedCached,
    Done,
    Failed,
}

/// Callback run on the coordinating loop after each periodic checkpoint flush.
pub type FlushHook = dyn Fn(&CheckpointStore) + Send + Sync;

/// Shared collaborators and settings for a drive.
#[derive(Clone)]
pub struct DriveOptions {
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Extractor,
    pub selector: Option<ScraperSelector>,
    pub summarizer: Arc<dyn Summarizer>,
    /// Maximum number of targets processed at once
    pub concurrency: usize,
    /// Directory receiving one audit file per summarized page
    pub pages_dir: Option<PathBuf>,
    /// Called after every successful periodic flush, not after the final one
    pub on_flush: Option<Arc<FlushHook>>,
}

/// Outcome of a drive.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Final state per target URL, in resolver order.
    pub states: Vec<(String, TargetState)>,
    pub done: usize,
    pub failed: usize,
    pub skipped_blacklist: usize,
    pub skipped_cached: usize,
    /// Number of completed targets at each successful flush, end of run included.
    pub flushes: Vec<usize>,
    /// Position of each URL in `states`.
    positions: HashMap<String, usize>,
}

impl RunReport {
    pub fn state_of(&self, url: &str) -> Option<TargetState> {
        let position = *self.positions.get(url)?;
        self.states.get(position).map(|(_, state)| *state)
    }

    /// Reserves the slot of a target whose outcome is not known yet.
    fn track(&mut self, url: &str) {
        if let Entry::Vacant(slot) = self.positions.entry(url.to_owned()) {
            slot.insert(self.states.len());
            self.states.push((url.to_owned(), TargetState::Failed));
        }
    }

    fn record(&mut self, url: &str, state: TargetState) {
        match state {
            TargetState::SkippedBlacklist => self.skipped_blacklist += 1,
            TargetState::SkippedCached => self.skipped_cached += 1,
            TargetState::Done => self.done += 1,
            TargetState::Failed => self.failed += 1,
        }
        self.track(url);
        if let Some(position) = self.positions.get(url)
            && let Some((_, current)) = self.states.get_mut(*position)
        {
            *current = state;
        }
    }
}

struct Summary {
    description: String,
    title: Option<String>,
}

struct Completion {
    target: Target,
    outcome: Result<Summary>,
}

/// Processes every target, skipping blacklisted and already checkpointed URLs.
///
/// `pages` holds HTML already retrieved by the crawler, keyed by target URL;
/// other targets are fetched. A failing target is logged and marked failed
/// without stopping the others. The store is flushed every
/// [`FLUSH_INTERVAL`] successes and once more at the end, whatever happened.
/// [`DriveOptions::on_flush`] runs after each periodic flush.
pub async fn drive(
    targets: Vec<Target>,
    mut pages: HashMap<String, String>,
    blacklist: &Blacklist,
    store: &mut CheckpointStore,
    options: &DriveOptions,
) -> RunReport {
    let mut report = RunReport::default();
    let mut pending = Vec::new();

    for target in targets {
        if blacklist.contains(&target.url) {
            info!("Skipping blacklisted URL: {}", target.url);
            report.record(&target.url, TargetState::SkippedBlacklist);
        } else if store.contains(&target.url) {
            debug!("Already summarized: {}", target.url);
            report.record(&target.url, TargetState::SkippedCached);
        } else {
            let html = pages.remove(&target.url);
            report.track(&target.url);
            pending.push((target, html));
        }
    }
    // Pending targets are counted once they complete.
    let pending_count = pending.len();
    info!(
        "{pending_count} targets to summarize, {} cached, {} blacklisted",
        report.skipped_cached, report.skipped_blacklist
    );

    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
    let dispatcher = tokio::spawn(dispatch(pending, options.clone(), completion_tx));

    let mut since_flush = 0;
    while let Some(Completion { target, outcome }) = completion_rx.recv().await {
        match outcome {
            Ok(summary) => {
                let title = target.title.as_deref().or(summary.title.as_deref());
                let entry = store.upsert(&target.url, &summary.description, title);
                info!("Summarized: {}", target.url);
                if let Some(pages_dir) = &options.pages_dir {
                    let line = render_page_line(
                        entry.title.as_deref(),
                        &entry.url,
                        &entry.description,
                    );
                    write_page_file(pages_dir, &target.url, &line);
                }

                report.record(&target.url, TargetState::Done);
                since_flush += 1;
                if since_flush >= FLUSH_INTERVAL {
                    since_flush = 0;
                    info!(
                        "Progress: {}/{pending_count} summarized, saving checkpoint",
                        report.done
                    );
                    if flush(store, &mut report)
                        && let Some(on_flush) = &options.on_flush
                    {
                        on_flush(store);
                    }
                }
            }
            Err(err) => {
                error!("Error summarizing {}: {err:#}", target.url);
                report.record(&target.url, TargetState::Failed);
            }
        }
    }

    if let Err(err) = dispatcher.await {
        error!("Target dispatcher stopped unexpectedly: {err}");
    }

    flush(store, &mut report);
    info!(
        "Run finished: {} summarized, {} failed, {} cached, {} blacklisted",
        report.done, report.failed, report.skipped_cached, report.skipped_blacklist
    );

    report
}

fn flush(store: &CheckpointStore, report: &mut RunReport) -> bool {
    match store.flush() {
        Ok(()) => {
            report.flushes.push(report.done);
            true
        }
        Err(err) => {
            error!(
                "Failed to save checkpoint {}, will retry: {err:#}",
                store.path().display()
            );
            false
        }
    }
}

/// Starts one task per target in order, never more than `concurrency` at once.
async fn dispatch(
    pending: Vec<(Target, Option<String>)>,
    options: DriveOptions,
    completion_tx: mpsc::UnboundedSender<Completion>,
) {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let options = Arc::new(options);

    for (target, html) in pending {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let options = Arc::clone(&options);
        let completion_tx = completion_tx.clone();

        tokio::spawn(async move {
            let outcome = process_target(&target, html, &options).await;
            if completion_tx.send(Completion { target, outcome }).is_err() {
                warn!("Completion channel closed before all targets finished");
            }
            drop(permit);
        });
    }
}

async fn process_target(
    target: &Target,
    html: Option<String>,
    options: &DriveOptions,
) -> Result<Summary> {
    debug!("Summarizing: {}", target.url);

    let html = match html {
        Some(html) => html,
        None => options.fetcher.fetch(&target.url).await?,
    };
    let article = extract_article(&html, &options.extractor, options.selector.as_ref())?;
    let response = options
        .summarizer
        .summarize(&target.url, &article.text)
        .await?;
    let description = clean_summary(&response);
    if description.is_empty() {
        bail!("Summarizer returned an empty description");
    }

    Ok(Summary {
        description,
        title: article.title,
    })
}

/// Derives the audit file name of a page from its host and path.
pub fn page_file_name(url: &str) -> String {
    let stem = match Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path()),
        Err(_) => url.to_owned(),
    };
    let stem: String = stem
        .trim_end_matches('/')
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.ends_with(".txt") {
        stem
    } else {
        format!("{stem}.txt")
    }
}

fn write_page_file(pages_dir: &std::path::Path, url: &str, line: &str) {
    let path = pages_dir.join(page_file_name(url));
    let written = std::fs::create_dir_all(pages_dir)
        .and_then(|()| std::fs::write(&path, format!("{line}\n\n")));
    if let Err(err) = written {
        warn!("Failed to write page summary {}: {err}", path.display());
    }
}
