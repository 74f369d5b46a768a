//! The summarize module turns extracted page text into a one-line description
//! using an LLM model.

use anyhow::{Result, anyhow};
use llm::chat::{ChatMessage, ChatMessageBuilder, ChatProvider};
use once_cell::sync::Lazy;
use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use regex::Regex;
use std::sync::Mutex;
use std::time::Duration;

use crate::BoxFuture;
use crate::constants::{DEFAULT_LLM_TIMEOUT_SECS, DEFAULT_PROMPT_TEMPLATE, THINK_STRIPPER};

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));

static LINE_BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*\r?\n\s*").expect("Failed to compile LINE_BREAK regex"));

/// Produces a description for a page.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(&'a self, url: &'a str, text: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Summarizer backed by any `llm` chat provider.
pub struct LlmSummarizer<P: ?Sized> {
    /// LLM model to use for summarization
    model: Box<P>,
    /// Prompt template with optional `{url}` and `{text}` placeholders
    prompt_template: String,
    /// Rate limiter for controlling request frequency
    rate_limiter: Option<Mutex<StdTokenBucket>>,
    /// Upper bound for a single LLM call
    timeout: Duration,
}

impl<P: ChatProvider + ?Sized> LlmSummarizer<P> {
    pub fn new(model: Box<P>) -> Self {
        Self {
            model,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_owned(),
            rate_limiter: None,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    /// Overrides the default prompt template.
    #[must_use]
    pub fn with_prompt_template(mut self, prompt_template: &str) -> Self {
        prompt_template.clone_into(&mut self.prompt_template);
        self
    }

    /// Limits LLM calls to `rpm` requests per minute.
    #[must_use]
    pub fn with_rpm(mut self, rpm: Option<u32>) -> Self {
        self.rate_limiter = rpm.and_then(|rpm| {
            let capacity = u64::from(rpm.max(1));
            let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

            TokenBucketBuilder::builder()
                .capacity(capacity)
                .refill_amount(1_u64)
                .refill_every(refill_interval)
                .with_time(rate_guard::StdTimeSource::new())
                .with_precision::<rate_guard::Nanos>()
                .build()
                .ok()
                .map(Mutex::new)
        });
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Summarises a single page by formatting its URL and content using the LLM model.
    ///
    /// The answer is returned as the model wrote it; see [`clean_summary`].
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM chat operation fails or times out.
    pub async fn summarize_page(&self, url: &str, text: &str) -> Result<String> {
        let prompt = self
            .prompt_template
            .replace("{url}", url)
            .replace("{text}", text);

        let mut messages: Vec<ChatMessageBuilder> = vec![ChatMessage::user().content(prompt)];

        if !self.prompt_template.contains("{text}") {
            messages.push(ChatMessage::user().content(text));
        }

        let messages: Vec<ChatMessage> = messages
            .into_iter()
            .map(|message| message.build())
            .collect();

        self.wait_for_rate_limit().await?;

        let response = tokio::time::timeout(self.timeout, self.model.chat(&messages))
            .await
            .map_err(|_| anyhow!("LLM call timed out after {:?}", self.timeout))?
            .map_err(|err| anyhow!("LLM error: {err}."))?
            .to_string();

        Ok(response)
    }

    async fn wait_for_rate_limit(&self) -> Result<()> {
        let Some(limiter) = &self.rate_limiter else {
            return Ok(());
        };

        loop {
            let acquired = limiter
                .lock()
                .map_err(|_| anyhow!("Rate limiter mutex poisoned"))?
                .try_acquire(1)
                .is_ok();
            if acquired {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

impl<P: ChatProvider + ?Sized> Summarizer for LlmSummarizer<P> {
    fn summarize<'a>(&'a self, url: &'a str, text: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.summarize_page(url, text))
    }
}

/// Strips reasoning blocks and folds the answer onto a single line, so it fits
/// after the link of an index entry.
pub fn clean_summary(response: &str) -> String {
    let stripped = THINK_STRIPPER_REGEX.replace_all(response, "");
    LINE_BREAK_REGEX
        .replace_all(stripped.trim(), " ")
        .trim()
        .to_owned()
}
