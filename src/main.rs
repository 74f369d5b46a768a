//! llmstxt-builder is a CLI tool that crawls a set of pages, or re-reads an
//! existing llms.txt, and writes an llms.txt index with a short LLM-generated
//! description per page.
//!
//! Finished descriptions are checkpointed in the project directory, so running
//! the same command again only summarizes what is still missing.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
use log::{LevelFilter, debug, info, warn};

use llmstxt_builder::{
    Collaborators, Extractor, GenerateOptions, HttpFetcher, LlmSummarizer, OutputMode, Source,
    SpiderCrawler, TitleFallback,
    constants::{
        DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_LLM_NAME, DEFAULT_LLM_PROVIDER,
        DEFAULT_LLM_TIMEOUT_SECS, DEFAULT_MAX_DEPTH, DEFAULT_OUTPUT_FILE, DEFAULT_PROJECT_DIR,
        DEFAULT_SUMMARIES_DIR, MODEL_API_KEY_ENV_NAME,
    },
    generate,
};

/// A CLI tool to build llms.txt with LLM-written page descriptions
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Seed URLs to crawl
    #[arg(long, num_args = 1..)]
    urls: Vec<String>,

    /// Path or URL of an existing llms.txt to take URLs from
    #[arg(long)]
    existing_llms_file: Option<String>,

    /// Only refresh descriptions of the existing llms.txt, keeping its structure
    #[arg(long, requires = "existing_llms_file")]
    update_descriptions_only: bool,

    /// Remove blacklisted entries when updating descriptions only
    #[arg(long, requires = "update_descriptions_only")]
    drop_blacklisted: bool,

    /// Maximum crawl depth from each seed URL
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// LLM provider, e.g. anthropic, openai, ollama
    #[arg(long, default_value = DEFAULT_LLM_PROVIDER)]
    llm_provider: String,

    /// LLM model name
    #[arg(long, default_value = DEFAULT_LLM_NAME)]
    llm_name: String,

    /// Prompt template for summarization, may use {url} and {text}
    #[arg(long, conflicts_with = "prompt_file")]
    summary_prompt: Option<String>,

    /// Path to the file with a prompt template
    #[arg(long, short = 'p')]
    prompt_file: Option<String>,

    /// File with URLs to exclude, one per line
    #[arg(long)]
    blacklist_file: Option<PathBuf>,

    /// Text extraction method: "dom_smoothie" (default), "fast_html2md" or "plain_text"
    #[arg(long, default_value = "dom_smoothie")]
    extractor: Extractor,

    /// CSS selector to limit the HTML subset from which content is extracted
    #[arg(long, short)]
    selector: Option<String>,

    /// Label entries without a page title with their full URL instead of the last path segment
    #[arg(long)]
    url_labels: bool,

    /// Directory to store all outputs
    #[arg(long, default_value = DEFAULT_PROJECT_DIR)]
    project_dir: PathBuf,

    /// Directory within project-dir for the checkpoint and per-page summaries
    #[arg(long, default_value = DEFAULT_SUMMARIES_DIR)]
    output_dir: String,

    /// Output file name within project-dir
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    output_file: String,

    /// Number of pages summarized at once
    #[arg(long, short, default_value_t = 1)]
    concurrency: usize,

    /// Rate limit: LLM requests per minute (default: no limit)
    #[arg(long, short = 'r')]
    rpm: Option<u32>,

    /// Delay between crawl requests in milliseconds
    #[arg(long, short, default_value_t = 250)]
    delay: u64,

    /// Timeout of a single LLM call in seconds
    #[arg(long, default_value_t = DEFAULT_LLM_TIMEOUT_SECS)]
    llm_timeout: u64,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", default_value_t = 2)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    let source = Source::from_inputs(
        cli.urls.clone(),
        cli.existing_llms_file.clone(),
        cli.max_depth,
    )?;

    let summarizer = build_summarizer(&cli)?;

    let http = HttpFetcher::new(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))?;
    let collaborators = Collaborators {
        crawler: Box::new(SpiderCrawler {
            delay: cli.delay,
            concurrency: cli.concurrency,
        }),
        fetcher: Arc::new(http.clone()),
        http,
        summarizer: Arc::new(summarizer),
    };

    let mut options = GenerateOptions::new(source);
    options.output_mode = if cli.update_descriptions_only {
        OutputMode::PreserveStructure {
            drop_blacklisted: cli.drop_blacklisted,
        }
    } else {
        OutputMode::Fresh
    };
    options.project_dir = cli.project_dir;
    options.summaries_dir = cli.output_dir;
    options.output_file = cli.output_file;
    options.blacklist_file = cli.blacklist_file;
    options.extractor = cli.extractor;
    options.selector = cli.selector;
    options.concurrency = cli.concurrency;
    if cli.url_labels {
        options.title_fallback = TitleFallback::Url;
    }

    let report = generate(&options, &collaborators).await?;

    if report.run.failed > 0 {
        warn!(
            "{} pages could not be summarized, rerun to retry them",
            report.run.failed
        );
    }
    info!(
        "Generated {} with {} entries",
        report.output_path.display(),
        report.entries
    );

    Ok(())
}

fn build_summarizer(cli: &Cli) -> Result<LlmSummarizer<dyn LLMProvider>> {
    let prompt_template = match (&cli.summary_prompt, &cli.prompt_file) {
        (Some(prompt), _) => Some(prompt.clone()),
        (None, Some(file)) => Some(
            fs::read_to_string(file).context(format!("Failed to read prompt file: {file}"))?,
        ),
        (None, None) => None,
    };

    let llm_builder = LLMBuilder::new()
        .backend(
            LLMBackend::from_str(&cli.llm_provider)
                .map_err(|e| anyhow::anyhow!("Invalid LLM backend: {}", e))?,
        )
        .model(&cli.llm_name);

    let llm_builder = match std::env::var(MODEL_API_KEY_ENV_NAME) {
        Ok(model_key) => {
            info!("API key is provided via {MODEL_API_KEY_ENV_NAME}");
            llm_builder.api_key(model_key)
        }
        Err(err) => {
            debug!("{err} while providing api key");
            llm_builder
        }
    };

    let model = llm_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))?;

    let summarizer = LlmSummarizer::new(model)
        .with_rpm(cli.rpm)
        .with_timeout(Duration::from_secs(cli.llm_timeout));

    Ok(match prompt_template.as_deref() {
        Some(prompt_template) => summarizer.with_prompt_template(prompt_template),
        None => summarizer,
    })
}
