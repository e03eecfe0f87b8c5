//! Document splitting strategies.
//!
//! [`TextSplitter`] wraps a recursive character splitter (`text-splitter`) and
//! adds structure-aware strategies for markdown, HTML, JSON and PDF input.
//! Every strategy returns [`Chunk`]s; structure-aware ones attach what they
//! learned about each span (header titles, page numbers) as chunk metadata.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use text_splitter::{Characters, ChunkConfig};

use qvrag_core::config::RagSettings;
use qvrag_core::{Chunk, Error, Metadata, Result};

mod html;
mod json;
mod markdown;
pub mod pdf;
pub mod split_type;

pub use html::HtmlHandler;
pub use pdf::load_pdf_pages;
pub use split_type::SplitType;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_json_chunk_size: usize,
    /// (tag, metadata key) pairs, shallowest first.
    pub html_headers_to_split_on: Vec<(String, String)>,
    pub html_elements_to_preserve: Vec<String>,
    /// (`#` prefix, metadata key) pairs.
    pub markdown_headers_to_split_on: Vec<(String, String)>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| -> Vec<(String, String)> {
            items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
        };
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_json_chunk_size: 300,
            html_headers_to_split_on: pairs(&[("h1", "Header 1"), ("h2", "Header 2"), ("h3", "Header 3")]),
            html_elements_to_preserve: vec!["table".into(), "ul".into(), "ol".into()],
            markdown_headers_to_split_on: pairs(&[("#", "Header 1"), ("##", "Header 2"), ("###", "Header 3")]),
        }
    }
}

impl SplitterConfig {
    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap, ..Self::default() }
    }

    pub fn from_settings(settings: &RagSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            max_json_chunk_size: settings.max_json_chunk_size,
            ..Self::default()
        }
    }
}

pub struct TextSplitter {
    config: SplitterConfig,
    recursive: text_splitter::TextSplitter<Characters>,
    // sections of an HTML page are re-split without overlap
    sections: text_splitter::TextSplitter<Characters>,
    markdown_levels: markdown::HeaderLevels,
    html_handlers: HashMap<String, HtmlHandler>,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let markdown_levels = markdown::HeaderLevels::from_prefixes(&config.markdown_headers_to_split_on);
        Ok(Self {
            recursive: text_splitter::TextSplitter::new(chunk_config),
            sections: text_splitter::TextSplitter::new(ChunkConfig::new(config.chunk_size)),
            markdown_levels,
            html_handlers: HashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Register a renderer for an HTML tag, replacing its default text.
    pub fn with_html_handler<F>(mut self, tag: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(scraper::ElementRef<'a>) -> String + Send + Sync + 'static,
    {
        self.html_handlers.insert(tag.into().to_ascii_lowercase(), Arc::new(handler));
        self
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.recursive.chunks(text).map(str::to_string).collect()
    }

    pub fn split_texts<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts.iter().flat_map(|t| self.split_text(t.as_ref())).collect()
    }

    /// Plain split where each chunk carries a copy of its text's metadata.
    /// Texts without a metadata entry get empty metadata.
    pub fn create_documents<S: AsRef<str>>(&self, texts: &[S], metadatas: &[Metadata]) -> Vec<Chunk> {
        let empty = Metadata::new();
        texts
            .iter()
            .enumerate()
            .flat_map(|(i, text)| {
                let meta = metadatas.get(i).unwrap_or(&empty);
                self.split_text(text.as_ref())
                    .into_iter()
                    .map(move |piece| Chunk::with_metadata(piece, meta.clone()))
            })
            .collect()
    }

    pub fn split_markdown(&self, text: &str) -> Vec<Chunk> {
        markdown::split_markdown(text, &self.markdown_levels)
    }

    pub fn split_json(&self, text: &str, convert_lists: bool) -> Result<Vec<Chunk>> {
        json::JsonSplitter::new(self.config.max_json_chunk_size).split_str(text, convert_lists)
    }

    pub fn split_html_by_headers(&self, html: &str) -> Vec<Chunk> {
        html::split_by_headers(
            html,
            &self.config.html_headers_to_split_on,
            &self.config.html_elements_to_preserve,
            &self.html_handlers,
        )
    }

    pub fn split_html_semantic(&self, html: &str) -> Vec<Chunk> {
        html::split_semantic(
            html,
            &self.config.html_headers_to_split_on,
            &self.config.html_elements_to_preserve,
            &self.html_handlers,
            self.config.chunk_size,
            |section| self.sections.chunks(section).map(str::to_string).collect(),
        )
    }

    /// Plain split of already extracted pages. Chunks carry their 1-based
    /// `page` and the `source` they came from.
    pub fn split_pages<S: AsRef<str>>(&self, pages: &[S], source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (i, page) in pages.iter().enumerate() {
            for piece in self.split_text(page.as_ref()) {
                let mut metadata = Metadata::new();
                metadata.insert("page".into(), (i + 1).into());
                metadata.insert("source".into(), source.into());
                chunks.push(Chunk::with_metadata(piece, metadata));
            }
        }
        chunks
    }

    pub fn split_pdf(&self, path: &Path) -> Result<Vec<Chunk>> {
        let pages = load_pdf_pages(path)?;
        let chunks = self.split_pages(&pages, &path.display().to_string());
        tracing::debug!(path = %path.display(), pages = pages.len(), chunks = chunks.len(), "split pdf");
        Ok(chunks)
    }

    pub fn split(&self, text: &str, split_type: SplitType) -> Result<Vec<Chunk>> {
        let chunks = match split_type {
            SplitType::Plain => self.split_text(text).into_iter().map(Chunk::new).collect(),
            SplitType::Markdown => self.split_markdown(text),
            SplitType::Html => self.split_html_semantic(text),
            SplitType::Json => self.split_json(text, false)?,
        };
        tracing::debug!(split_type = %split_type, chunks = chunks.len(), "split text");
        Ok(chunks)
    }
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("config", &self.config)
            .field("html_handlers", &self.html_handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
