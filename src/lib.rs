//! The llmstxt-builder library crawls or re-reads a set of pages, asks an LLM for a
//! short description of each one and composes the results into an llms.txt index.
//!
//! Work is checkpointed to disk so an interrupted run resumes without repeating
//! finished summaries, and an existing index can be refreshed in place without
//! touching its layout.

use std::future::Future;
use std::pin::Pin;

pub mod blacklist;
pub mod checkpoint;
pub mod compose;
pub mod constants;
pub mod crawl;
pub mod document;
pub mod driver;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod source;
pub mod summarize;
pub mod target;

/// Boxed future returned by collaborators that run on the worker pool.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed future for collaborators awaited on the calling task only.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub use blacklist::Blacklist;
pub use checkpoint::{CheckpointEntry, CheckpointStore};
pub use compose::{TitleFallback, build_fresh, merge_into, render_page_line};
pub use crawl::{CrawledPage, Crawler, SpiderCrawler};
pub use document::{EntryNode, IndexDocument, Node};
pub use driver::{DriveOptions, FlushHook, RunReport, TargetState, drive};
pub use extract::{Extractor, PageArticle, extract_article};
pub use fetch::{HttpFetcher, PageFetcher};
pub use pipeline::{Collaborators, GenerateOptions, GenerateReport, OutputMode, Source, generate};
pub use source::{ResolvedSources, resolve};
pub use summarize::{LlmSummarizer, Summarizer};
pub use target::{Target, normalize_url};
