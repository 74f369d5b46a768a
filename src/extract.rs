use anyhow::{Result, bail};
use dom_smoothie::{Article, CandidateSelectMode, Config, Readability, TextMode};
use html2md;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector as ScraperSelector};
use std::fmt;
use std::sync::Arc;

static BLANK_LINES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n(\s*\n)*").expect("Failed to compile BLANK_LINES regex"));

/// Caller-supplied extraction function.
pub type ExtractFn = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Text extraction method applied to fetched HTML.
#[derive(Clone, Default)]
pub enum Extractor {
    /// Readability article detection rendered as markdown
    #[default]
    DomSmoothie,
    /// Whole-page markdown conversion with fast_html2md
    FastHtml2Md,
    /// Plain text of the main article element, else the whole body
    PlainText,
    /// Any function with the same contract
    Custom(Arc<ExtractFn>),
}

impl Extractor {
    /// Wraps a caller-supplied extraction function.
    pub fn custom<F>(extract: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(extract))
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomSmoothie => write!(formatter, "DomSmoothie"),
            Self::FastHtml2Md => write!(formatter, "FastHtml2Md"),
            Self::PlainText => write!(formatter, "PlainText"),
            Self::Custom(_) => write!(formatter, "Custom(..)"),
        }
    }
}

impl std::str::FromStr for Extractor {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "dom_smoothie" => Ok(Self::DomSmoothie),
            "fast_html2md" | "default" | "markdown" => Ok(Self::FastHtml2Md),
            "plain_text" | "bs4" => Ok(Self::PlainText),
            _ => Err(format!("Invalid text extraction method: {input}")),
        }
    }
}

/// Represents an article extracted from a webpage.
#[derive(Debug)]
pub struct PageArticle {
    /// The title of the article, if available.
    pub title: Option<String>,
    /// The text content of the article.
    pub text: String,
}

/// Extracts an article from the given HTML content.
///
/// # Arguments
///
/// * `html` - The HTML content of the webpage.
/// * `extractor` - The method to use for text extraction.
/// * `selector` - An optional CSS selector to limit the HTML subset from which content is extracted.
///
/// # Errors
///
/// This function will return an error if:
///
/// - The chosen extraction method fails on the HTML content.
/// - No text is left after extraction.
pub fn extract_article(
    html: &str,
    extractor: &Extractor,
    selector: Option<&ScraperSelector>,
) -> Result<PageArticle> {
    let title = parse_title(html);
    let selected_content;
    let selected_html = match selector {
        Some(sel) => {
            let document = Html::parse_document(html);
            selected_content = document
                .select(sel)
                .map(|el| el.html())
                .collect::<Vec<String>>()
                .join("\n");
            selected_content.as_str()
        }
        None => html,
    };

    let text = match extractor {
        Extractor::DomSmoothie => {
            let config = Config {
                text_mode: TextMode::Markdown,
                candidate_select_mode: CandidateSelectMode::DomSmoothie,
                ..Default::default()
            };

            let mut readability = Readability::new(selected_html, None, Some(config))?;
            let article: Article = readability.parse()?;
            article.text_content.to_string()
        }
        Extractor::FastHtml2Md => html2md::parse_html(selected_html, false),
        Extractor::PlainText => plain_text(selected_html),
        Extractor::Custom(extract) => extract(selected_html)?,
    };

    let text = text.trim().to_owned();
    if text.is_empty() {
        bail!("No text could be extracted");
    }

    Ok(PageArticle { title, text })
}

/// Collects the text of the main article element, falling back to the body.
fn plain_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let text = ["article.md-content__inner", "main", "body"]
        .iter()
        .filter_map(|query| ScraperSelector::parse(query).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .next()
                .map(|element| element.text().collect::<String>())
        })
        .unwrap_or_else(|| document.root_element().text().collect());

    BLANK_LINES_REGEX.replace_all(&text, "\n\n").to_string()
}

/// Parses the title from HTML content
pub fn parse_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for tag in ["title", "h1", "h2"] {
        if let Ok(tag_selector) = ScraperSelector::parse(tag)
            && let Some(tag_element) = document.select(&tag_selector).next()
        {
            let tag_text = tag_element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !tag_text.is_empty() {
                return Some(tag_text);
            }
        }
    }

    None
}
