pub const MODEL_API_KEY_ENV_NAME: &str = "LLMSTXT_MODEL_API_KEY";

pub const USER_AGENT: &str = "llmstxt-builder Bot";

/// Number of successful summaries between two periodic checkpoint flushes.
pub const FLUSH_INTERVAL: usize = 5;

pub const CHECKPOINT_FILE_NAME: &str = "summarized_urls.json";

pub const DEFAULT_PROJECT_DIR: &str = "llms_txt";
pub const DEFAULT_SUMMARIES_DIR: &str = "summaries";
pub const DEFAULT_OUTPUT_FILE: &str = "llms.txt";
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_LLM_PROVIDER: &str = "anthropic";
pub const DEFAULT_LLM_NAME: &str = "claude-3-7-sonnet-latest";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

pub(crate) const DEFAULT_PROMPT_TEMPLATE: &str = r#"
You are creating a summary for the webpage {url} to be used in a llms.txt file
to help LLMs in the future know what is on this page.
Produce a concise summary of the key items on this page and when an LLM should access it.
Answer in EXACTLY this format, with NO deviation:
Line 1: 'LLM should read this page when [2-3 specific scenarios based on page content]'
Line 2: '[Direct summary of main topics with no preamble, under 100 words]'
Total length must be under 150 words. Do not start with phrases like 'Here is...' or 'This summary...'.
Webpage content to summarize:"#;
