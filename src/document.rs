//! The document module parses an existing llms.txt into typed nodes.
//!
//! Every line becomes either a verbatim text node or an entry node holding a
//! `[title](url): description` link. Serializing an untouched document gives
//! back the exact input, line terminators included.

use once_cell::sync::Lazy;
use regex::Regex;

static ENTRY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<prefix>[ \t]*(?:[-*+][ \t]+)?)",
        r"\[(?P<title>(?:[^\[\]\\]|\\.)*)\]",
        r"\((?P<url>https?://(?:[^()\s]|\([^()\s]*\))+)\)",
        r"(?P<separator>[ \t]*:[ \t]*)?(?P<description>.*)$",
    ))
    .expect("Failed to compile ENTRY_REGEX regex")
});

/// One link line of an index.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntryNode {
    /// Indentation and list marker before the link, e.g. `"- "`.
    pub prefix: String,
    pub title: String,
    /// URL exactly as written in the file.
    pub url: String,
    /// Text between the link and the description, usually `": "`.
    pub separator: String,
    pub description: String,
    /// `"\n"`, `"\r\n"` or empty for a last line without terminator.
    pub line_ending: String,
}

impl EntryNode {
    /// Title with markdown escapes removed.
    pub fn label(&self) -> String {
        unescape_label(&self.title)
    }

    /// Replaces the description, adding a `": "` separator if the line had none.
    pub fn set_description(&mut self, description: &str) {
        if self.separator.is_empty() {
            self.separator = ": ".to_owned();
        }
        self.description = description.to_owned();
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.prefix);
        out.push('[');
        out.push_str(&self.title);
        out.push_str("](");
        out.push_str(&self.url);
        out.push(')');
        out.push_str(&self.separator);
        out.push_str(&self.description);
        out.push_str(&self.line_ending);
    }
}

/// Structural unit of an index document.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    /// Verbatim line including its terminator.
    Text(String),
    Entry(EntryNode),
}

/// An existing index as an ordered list of nodes.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct IndexDocument {
    pub nodes: Vec<Node>,
}

impl IndexDocument {
    /// Parses markdown index text. Parsing never fails: any line that is not a
    /// link entry is kept as text.
    pub fn parse(text: &str) -> Self {
        let nodes = text
            .split_inclusive('\n')
            .map(|line| {
                let (body, line_ending) = split_line_ending(line);
                match ENTRY_REGEX.captures(body) {
                    Some(captures) => {
                        let field = |name: &str| {
                            captures
                                .name(name)
                                .map(|m| m.as_str().to_owned())
                                .unwrap_or_default()
                        };
                        Node::Entry(EntryNode {
                            prefix: field("prefix"),
                            title: field("title"),
                            url: field("url"),
                            separator: field("separator"),
                            description: field("description"),
                            line_ending: line_ending.to_owned(),
                        })
                    }
                    None => Node::Text(line.to_owned()),
                }
            })
            .collect();

        Self { nodes }
    }

    /// Iterates over entry nodes together with their node index.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &EntryNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match node {
                Node::Entry(entry) => Some((index, entry)),
                Node::Text(_) => None,
            })
    }

    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }

    pub fn text_count(&self) -> usize {
        self.nodes.len() - self.entry_count()
    }

    /// Renders the document back to text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Entry(entry) => entry.render(&mut out),
            }
        }
        out
    }
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Escapes a link label so brackets inside it cannot end the link early.
pub fn escape_label(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '\\' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Reverses [`escape_label`]. A lone trailing backslash is kept as is.
pub fn unescape_label(label: &str) -> String {
    let mut unescaped = String::with_capacity(label.len());
    let mut chars = label.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => unescaped.push(chars.next().unwrap_or('\\')),
            _ => unescaped.push(c),
        }
    }
    unescaped
}
