#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use llm::{
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    error::LLMError,
};
use llmstxt_builder::{
    BoxFuture, Collaborators, CrawledPage, Crawler, Extractor, HttpFetcher, LocalBoxFuture,
    PageFetcher, Summarizer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[macro_export]
macro_rules! assert_responses {
    (
        $(
            $test_name:ident : response => $response:expr, result => $result:expr
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $test_name() {
                let provider = StubLlmProvider::new($response.to_owned());
                let summarizer = llmstxt_builder::LlmSummarizer::new(Box::new(provider));
                let response = summarizer
                    .summarize_page("", "")
                    .await
                    .expect("Expected successful processing.");
                let result = llmstxt_builder::summarize::clean_summary(&response);

                assert_that(&result).is_equal_to($result.to_owned());
            }
        )+
    }
}

pub(crate) struct StubLlmProvider {
    response_content: String,
}

impl StubLlmProvider {
    pub fn new(response_content: String) -> Self {
        StubLlmProvider { response_content }
    }
}

impl ChatProvider for StubLlmProvider {
    fn chat<'life0, 'life1, 'async_trait>(
        &'life0 self,
        _messages: &'life1 [ChatMessage],
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            #[derive(Debug)]
            struct StringResponse(String);

            impl ChatResponse for StringResponse {
                fn text(&self) -> Option<String> {
                    Some(self.0.clone())
                }

                fn tool_calls(&self) -> Option<Vec<llm::ToolCall>> {
                    None
                }

                fn thinking(&self) -> Option<String> {
                    None
                }

                fn usage(&self) -> Option<llm::chat::Usage> {
                    None
                }
            }

            impl std::fmt::Display for StringResponse {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(formatter, "{}", self.0)
                }
            }

            Ok(Box::new(StringResponse(self.response_content.clone())) as Box<dyn ChatResponse>)
        })
    }

    fn chat_with_tools<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        messages: &'life1 [ChatMessage],
        _tools: Option<&'life2 [Tool]>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        self.chat(messages)
    }
}

/// Crawler returning canned pages per seed and recording each call.
#[derive(Default)]
pub(crate) struct StubCrawler {
    pub pages: HashMap<String, Vec<CrawledPage>>,
    pub calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StubCrawler {
    pub fn with_seed(mut self, seed: &str, pages: &[(&str, &str)]) -> Self {
        self.pages.insert(
            seed.to_owned(),
            pages
                .iter()
                .map(|(url, html)| CrawledPage {
                    url: (*url).to_owned(),
                    html: (*html).to_owned(),
                })
                .collect(),
        );
        self
    }
}

impl Crawler for StubCrawler {
    fn crawl<'a>(
        &'a self,
        seed: &'a Url,
        max_depth: usize,
    ) -> LocalBoxFuture<'a, Result<Vec<CrawledPage>>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((seed.to_string(), max_depth));
            }
            self.pages
                .get(seed.as_str())
                .cloned()
                .ok_or_else(|| anyhow!("Connection refused: {seed}"))
        })
    }
}

/// Fetcher serving canned pages, failing for unknown URLs.
#[derive(Default)]
pub(crate) struct StubFetcher {
    pub pages: HashMap<String, String>,
}

impl StubFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_owned(), html.to_owned());
        self
    }
}

impl PageFetcher for StubFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("404 Not Found: {url}"))
        })
    }
}

/// Summarizer describing a page by its URL.
///
/// Text containing `FAIL` makes the call fail, text containing `SAME` yields a
/// description shared by every such page.
#[derive(Default)]
pub(crate) struct StubSummarizer {
    pub calls: AtomicUsize,
    pub prefix: String,
}

impl StubSummarizer {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prefix: prefix.to_owned(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Summarizer for StubSummarizer {
    fn summarize<'a>(&'a self, url: &'a str, text: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                bail!("rate limit exceeded");
            }
            if text.contains("SAME") {
                return Ok("Shared description".to_owned());
            }
            Ok(format!("{}About {url}\nwith details", self.prefix))
        })
    }
}

/// Extractor handing the raw page through, so stub pages can be plain text.
pub(crate) fn passthrough_extractor() -> Extractor {
    Extractor::custom(|html| Ok(html.to_owned()))
}

pub(crate) fn collaborators(
    crawler: StubCrawler,
    fetcher: StubFetcher,
    summarizer: Arc<StubSummarizer>,
) -> Collaborators {
    Collaborators {
        crawler: Box::new(crawler),
        http: HttpFetcher::new(Duration::from_secs(5)).expect("HTTP client should build"),
        fetcher: Arc::new(fetcher),
        summarizer,
    }
}
