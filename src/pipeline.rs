//! The pipeline module wires a whole run together: configuration checks,
//! target resolution, summarization and composition of the final index.

use anyhow::{Result, bail};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::blacklist::Blacklist;
use crate::checkpoint::CheckpointStore;
use crate::compose::{TitleFallback, build_fresh, merge_into, write_output};
use crate::constants::{
    CHECKPOINT_FILE_NAME, DEFAULT_OUTPUT_FILE, DEFAULT_PROJECT_DIR, DEFAULT_SUMMARIES_DIR,
};
use crate::crawl::Crawler;
use crate::document::IndexDocument;
use crate::driver::{DriveOptions, FlushHook, RunReport, drive};
use crate::extract::Extractor;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::source::resolve;
use crate::summarize::Summarizer;

/// Where the targets of a run come from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Source {
    /// Seed URLs expanded by the crawler.
    Urls { seeds: Vec<String>, max_depth: usize },
    /// Entries of an existing llms.txt, local path or http(s) URL.
    ExistingIndex { location: String },
}

impl Source {
    /// Picks the source from seed URLs and an existing index location.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one of the two is supplied.
    pub fn from_inputs(
        seeds: Vec<String>,
        existing_index: Option<String>,
        max_depth: usize,
    ) -> Result<Self> {
        match (seeds.is_empty(), existing_index) {
            (false, Some(_)) => {
                bail!("Seed URLs and an existing llms.txt are mutually exclusive")
            }
            (true, None) => bail!("Either seed URLs or an existing llms.txt is required"),
            (true, Some(location)) => Ok(Self::ExistingIndex { location }),
            (false, None) => Ok(Self::Urls { seeds, max_depth }),
        }
    }
}

/// How the final index is produced.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OutputMode {
    /// Rebuild a sorted, deduplicated index from all checkpointed descriptions.
    #[default]
    Fresh,
    /// Refresh only the descriptions of the existing index.
    PreserveStructure {
        /// Remove blacklisted entries instead of leaving them untouched.
        drop_blacklisted: bool,
    },
}

/// Settings of one run.
#[derive(Clone, Debug)]
pub struct GenerateOptions {
    pub source: Source,
    pub output_mode: OutputMode,
    /// Directory holding every artifact of the run
    pub project_dir: PathBuf,
    /// Sub-directory of `project_dir` for the checkpoint and per-page files
    pub summaries_dir: String,
    /// File name of the index inside `project_dir`
    pub output_file: String,
    pub blacklist_file: Option<PathBuf>,
    pub extractor: Extractor,
    /// CSS selector narrowing the HTML before extraction
    pub selector: Option<String>,
    pub concurrency: usize,
    pub title_fallback: TitleFallback,
}

impl GenerateOptions {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            output_mode: OutputMode::default(),
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            summaries_dir: DEFAULT_SUMMARIES_DIR.to_owned(),
            output_file: DEFAULT_OUTPUT_FILE.to_owned(),
            blacklist_file: None,
            extractor: Extractor::default(),
            selector: None,
            concurrency: 1,
            title_fallback: TitleFallback::default(),
        }
    }

    pub fn summaries_path(&self) -> PathBuf {
        self.project_dir.join(&self.summaries_dir)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.summaries_path().join(CHECKPOINT_FILE_NAME)
    }

    pub fn output_path(&self) -> PathBuf {
        self.project_dir.join(&self.output_file)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if matches!(self.output_mode, OutputMode::PreserveStructure { .. })
            && !matches!(self.source, Source::ExistingIndex { .. })
        {
            bail!("Updating descriptions only requires an existing llms.txt");
        }
        Ok(())
    }
}

/// External services used by a run.
pub struct Collaborators {
    pub crawler: Box<dyn Crawler>,
    pub http: HttpFetcher,
    /// Fetches targets the crawler did not return, usually `http` itself.
    pub fetcher: Arc<dyn PageFetcher>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// Outcome of a run.
#[derive(Debug)]
pub struct GenerateReport {
    pub run: RunReport,
    pub output_path: PathBuf,
    /// Number of entries in the written index.
    pub entries: usize,
}

/// Runs the whole pipeline and writes the index.
///
/// Per-page failures only show up in the report; the index is written from
/// whatever is checkpointed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the blacklist or the
/// existing index cannot be read, or the index cannot be written.
pub async fn generate(
    options: &GenerateOptions,
    collaborators: &Collaborators,
) -> Result<GenerateReport> {
    options.validate()?;

    let selector = options
        .selector
        .as_deref()
        .map(|query| {
            scraper::Selector::parse(query)
                .map_err(|e| anyhow::anyhow!("Invalid CSS selector: {e}"))
        })
        .transpose()?;

    let blacklist = match &options.blacklist_file {
        Some(path) => Blacklist::load(path)?,
        None => Blacklist::default(),
    };

    let resolved = resolve(
        &options.source,
        collaborators.crawler.as_ref(),
        &collaborators.http,
    )
    .await?;

    let mut store = CheckpointStore::load(options.checkpoint_path());
    info!(
        "Loaded {} checkpointed summaries from {}",
        store.len(),
        store.path().display()
    );

    let drive_options = DriveOptions {
        fetcher: Arc::clone(&collaborators.fetcher),
        extractor: options.extractor.clone(),
        selector,
        summarizer: Arc::clone(&collaborators.summarizer),
        concurrency: options.concurrency,
        pages_dir: Some(options.summaries_path()),
        on_flush: Some(index_refresher(
            options,
            resolved.document.clone(),
            blacklist.clone(),
        )),
    };
    let run = drive(
        resolved.targets,
        resolved.pages,
        &blacklist,
        &mut store,
        &drive_options,
    )
    .await;

    let (content, entries) = compose_index(
        options.output_mode,
        resolved.document.as_ref(),
        &store,
        &blacklist,
        options.title_fallback,
    );

    let output_path = options.output_path();
    write_output(&output_path, &content)?;

    Ok(GenerateReport {
        run,
        output_path,
        entries,
    })
}

/// Rewrites the index from the checkpoint so far, keeping an interrupted run usable.
fn index_refresher(
    options: &GenerateOptions,
    document: Option<IndexDocument>,
    blacklist: Blacklist,
) -> Arc<FlushHook> {
    let output_mode = options.output_mode;
    let fallback = options.title_fallback;
    let output_path = options.output_path();

    Arc::new(move |store: &CheckpointStore| {
        let (content, entries) =
            compose_index(output_mode, document.as_ref(), store, &blacklist, fallback);
        match write_output(&output_path, &content) {
            Ok(()) => info!("Refreshed index with {entries} entries"),
            Err(err) => warn!("Failed to refresh {}: {err:#}", output_path.display()),
        }
    })
}

fn compose_index(
    output_mode: OutputMode,
    document: Option<&IndexDocument>,
    store: &CheckpointStore,
    blacklist: &Blacklist,
    fallback: TitleFallback,
) -> (String, usize) {
    match (output_mode, document) {
        (OutputMode::PreserveStructure { drop_blacklisted }, Some(document)) => {
            let merged = merge_into(document, store, blacklist, drop_blacklisted);
            (merged.render(), merged.entry_count())
        }
        _ => {
            let content = build_fresh(store, blacklist, fallback);
            let entries = content.lines().filter(|line| !line.is_empty()).count();
            (content, entries)
        }
    }
}
