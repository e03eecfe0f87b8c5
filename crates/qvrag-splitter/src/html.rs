//! HTML splitting by header sections.
//!
//! The document is walked in order. Configured header tags open a new section
//! and record their text as metadata; everything else contributes text to the
//! current section. Elements listed as preserved are rendered as a single
//! block that later size-based splitting never cuts.

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{node::Node, ElementRef, Html};

use qvrag_core::{Chunk, Metadata};

/// Renders an element into text in place of the default rendering.
pub type HtmlHandler = Arc<dyn for<'a> Fn(ElementRef<'a>) -> String + Send + Sync>;

const SKIPPED: &[&str] = &["head", "script", "style", "noscript", "template"];
const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "nav", "li", "tr",
    "br", "blockquote", "pre", "h4", "h5", "h6", "dd", "dt", "figure", "figcaption", "form",
    "table", "ul", "ol",
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block {
    Text(String),
    Preserved(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Section {
    pub(crate) metadata: Metadata,
    pub(crate) blocks: Vec<Block>,
}

impl Section {
    pub(crate) fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Text(t) | Block::Preserved(t) => t.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub(crate) struct HtmlSections<'c> {
    headers: &'c [(String, String)],
    preserve: &'c [String],
    handlers: &'c HashMap<String, HtmlHandler>,
    // (level index into `headers`, title)
    stack: Vec<(usize, String)>,
    current: Section,
    paragraph: String,
    sections: Vec<Section>,
}

impl<'c> HtmlSections<'c> {
    pub(crate) fn collect(
        html: &str,
        headers: &'c [(String, String)],
        preserve: &'c [String],
        handlers: &'c HashMap<String, HtmlHandler>,
    ) -> Vec<Section> {
        let doc = Html::parse_document(html);
        let mut walker = Self {
            headers,
            preserve,
            handlers,
            stack: Vec::new(),
            current: Section::default(),
            paragraph: String::new(),
            sections: Vec::new(),
        };
        walker.walk(doc.root_element());
        walker.close_section();
        walker.sections
    }

    fn walk(&mut self, el: ElementRef<'_>) {
        let tag = el.value().name();
        if SKIPPED.contains(&tag) {
            return;
        }
        let (handlers, headers) = (self.handlers, self.headers);
        if let Some(handler) = handlers.get(tag) {
            // handler output is inline text
            push_words(&mut self.paragraph, &handler(el));
            return;
        }
        if let Some(level) = headers.iter().position(|(h, _)| h.eq_ignore_ascii_case(tag)) {
            self.close_section();
            let title = collapse_whitespace(&el.text().collect::<String>());
            self.stack.retain(|(l, _)| *l < level);
            self.stack.push((level, title));
            self.current.metadata = self
                .stack
                .iter()
                .map(|(l, t)| (headers[*l].1.clone(), serde_json::Value::String(t.clone())))
                .collect();
            return;
        }
        if self.preserve.iter().any(|p| p.eq_ignore_ascii_case(tag)) {
            self.flush_paragraph();
            let rendered = render_preserved(el);
            if !rendered.is_empty() {
                self.current.blocks.push(Block::Preserved(rendered));
            }
            return;
        }
        let is_block = BLOCKS.contains(&tag);
        if is_block {
            self.flush_paragraph();
        }
        for child in el.children() {
            match child.value() {
                Node::Text(text) => push_words(&mut self.paragraph, text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.walk(child_el);
                    }
                }
                _ => {}
            }
        }
        if is_block {
            self.flush_paragraph();
        }
    }

    fn flush_paragraph(&mut self) {
        let para = std::mem::take(&mut self.paragraph);
        let para = para.trim();
        if !para.is_empty() {
            self.current.blocks.push(Block::Text(para.to_string()));
        }
    }

    fn close_section(&mut self) {
        self.flush_paragraph();
        let section = std::mem::take(&mut self.current);
        if !section.blocks.is_empty() {
            self.sections.push(section);
        }
    }
}

/// Header sections, one chunk each.
pub(crate) fn split_by_headers(
    html: &str,
    headers: &[(String, String)],
    preserve: &[String],
    handlers: &HashMap<String, HtmlHandler>,
) -> Vec<Chunk> {
    HtmlSections::collect(html, headers, preserve, handlers)
        .into_iter()
        .map(|s| Chunk::with_metadata(s.text(), s.metadata))
        .collect()
}

/// Header sections, each further split by `split` when longer than
/// `max_chunk_size` characters. Preserved blocks are swapped for placeholder
/// words before splitting and restored afterwards, so they are never cut.
pub(crate) fn split_semantic<F>(
    html: &str,
    headers: &[(String, String)],
    preserve: &[String],
    handlers: &HashMap<String, HtmlHandler>,
    max_chunk_size: usize,
    split: F,
) -> Vec<Chunk>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut chunks = Vec::new();
    for section in HtmlSections::collect(html, headers, preserve, handlers) {
        let full = section.text();
        if full.chars().count() <= max_chunk_size {
            chunks.push(Chunk::with_metadata(full, section.metadata));
            continue;
        }
        let mut preserved = Vec::new();
        let mut parts = Vec::with_capacity(section.blocks.len());
        for block in &section.blocks {
            match block {
                Block::Text(t) => parts.push(t.clone()),
                Block::Preserved(t) => {
                    parts.push(placeholder(preserved.len()));
                    preserved.push(t.clone());
                }
            }
        }
        for piece in split(&parts.join("\n\n")) {
            let mut restored = piece;
            for (i, original) in preserved.iter().enumerate().rev() {
                restored = restored.replace(&placeholder(i), original);
            }
            chunks.push(Chunk::with_metadata(restored, section.metadata.clone()));
        }
    }
    chunks
}

/// Stand-in for the i-th preserved block. Private-use code points never
/// appear in rendered page text.
fn placeholder(i: usize) -> String {
    format!("\u{E000}PRESERVED_{}\u{E001}", i)
}

fn render_preserved(el: ElementRef<'_>) -> String {
    match el.value().name() {
        "table" => el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr")
            .map(|row| {
                row.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th"))
                    .map(|c| collapse_whitespace(&c.text().collect::<String>()))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .filter(|row| !row.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        tag @ ("ul" | "ol") => el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == "li")
            .enumerate()
            .map(|(i, li)| {
                let item = collapse_whitespace(&li.text().collect::<String>());
                if tag == "ol" { format!("{}. {}", i + 1, item) } else { format!("- {}", item) }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => collapse_whitespace(&el.text().collect::<String>()),
    }
}

fn push_words(buf: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(word);
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> Vec<(String, String)> {
        vec![
            ("h1".into(), "Header 1".into()),
            ("h2".into(), "Header 2".into()),
            ("h3".into(), "Header 3".into()),
        ]
    }

    fn preserve() -> Vec<String> {
        vec!["table".into(), "ul".into(), "ol".into()]
    }

    const PAGE: &str = r#"<html><head><title>T</title><script>var x = 1;</script></head><body>
        <p>Lead paragraph.</p>
        <h1>Animals</h1><p>All about   animals.</p>
        <h2>Cats</h2><p>Cats purr.</p>
        <ul><li>Tabby</li><li>Siamese</li></ul>
        <h2>Dogs</h2><p>Dogs bark.</p>
        </body></html>"#;

    #[test]
    fn sections_follow_headers() {
        let chunks = split_by_headers(PAGE, &headers(), &preserve(), &HashMap::new());
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["Lead paragraph.", "All about animals.", "Cats purr.\n\n- Tabby\n- Siamese", "Dogs bark."]);
        assert!(chunks[0].metadata.is_empty());
        assert_eq!(chunks[2].metadata["Header 1"], json!("Animals"));
        assert_eq!(chunks[2].metadata["Header 2"], json!("Cats"));
        assert_eq!(chunks[3].metadata["Header 2"], json!("Dogs"));
    }

    #[test]
    fn scripts_and_head_are_ignored() {
        let chunks = split_by_headers(PAGE, &headers(), &preserve(), &HashMap::new());
        assert!(chunks.iter().all(|c| !c.text.contains("var x")));
        assert!(chunks.iter().all(|c| c.text != "T"));
    }

    #[test]
    fn tables_render_rows() {
        let html = "<table><tr><th>k</th><th>v</th></tr><tr><td>a</td><td>1</td></tr></table>";
        let chunks = split_by_headers(html, &headers(), &preserve(), &HashMap::new());
        assert_eq!(chunks[0].text, "k | v\na | 1");
    }

    #[test]
    fn custom_handler_replaces_rendering() {
        let mut handlers: HashMap<String, HtmlHandler> = HashMap::new();
        handlers.insert(
            "code".into(),
            Arc::new(|el: ElementRef<'_>| format!("`{}`", el.text().collect::<String>())),
        );
        let chunks = split_by_headers("<p>Run <code>ls</code> now</p>", &headers(), &preserve(), &handlers);
        assert_eq!(chunks[0].text, "Run `ls` now");
    }

    #[test]
    fn semantic_split_keeps_preserved_blocks_whole() {
        let items: String = (0..5).map(|i| format!("<li>item {i}</li>")).collect();
        let html = format!("<h1>H</h1><p>{}</p><ul>{}</ul><p>{}</p>", "word ".repeat(20), items, "tail ".repeat(20));
        // naive splitter: one piece per paragraph
        let chunks = split_semantic(&html, &headers(), &preserve(), &HashMap::new(), 50, |s| {
            s.split("\n\n").map(str::to_string).collect()
        });
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, "- item 0\n- item 1\n- item 2\n- item 3\n- item 4");
        assert!(chunks.iter().all(|c| c.metadata["Header 1"] == json!("H")));
    }

    #[test]
    fn literal_placeholder_text_survives_resplit() {
        let html = format!(
            "<h1>H</h1><p>The token PRESERVED_0 appears literally {}</p><ul><li>alpha</li><li>beta</li></ul>",
            "filler ".repeat(10)
        );
        let chunks = split_semantic(&html, &headers(), &preserve(), &HashMap::new(), 40, |s| {
            s.split("\n\n").map(str::to_string).collect()
        });
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("The token PRESERVED_0 appears literally"));
        assert_eq!(chunks[1].text, "- alpha\n- beta");
    }
}
