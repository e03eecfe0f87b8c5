//! qvrag-engine
//!
//! [`RagEngine`] ties a [`TextSplitter`] to a [`LanceStorage`] collection:
//! documents go in whole, get split by the requested strategy, inherit their
//! document's metadata chunk by chunk, and come back out as ranked chunks.

use std::path::Path;

use serde_json::Value;

use qvrag_core::config::RagSettings;
use qvrag_core::traits::Embedder;
use qvrag_core::{Chunk, CollectionInfo, Error, Metadata, QueryResult, Result};
use qvrag_embed::get_default_embedder;
use qvrag_splitter::{load_pdf_pages, SplitterConfig, TextSplitter};
use qvrag_storage::LanceStorage;

pub use qvrag_splitter::SplitType;

pub const DEFAULT_TOP_K: usize = 5;

pub struct RagEngine {
    splitter: TextSplitter,
    storage: LanceStorage,
    top_k: usize,
}

impl RagEngine {
    /// Engine over `collection_name` using the embedder selected by the
    /// environment (see [`get_default_embedder`]).
    pub async fn new(
        collection_name: &str,
        chunk_size: usize,
        chunk_overlap: usize,
        persist_directory: Option<&Path>,
    ) -> Result<Self> {
        let embedder = get_default_embedder()?;
        Self::with_embedder(collection_name, chunk_size, chunk_overlap, persist_directory, embedder).await
    }

    pub async fn with_embedder(
        collection_name: &str,
        chunk_size: usize,
        chunk_overlap: usize,
        persist_directory: Option<&Path>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(SplitterConfig::with_sizes(chunk_size, chunk_overlap))?;
        let storage = LanceStorage::open(collection_name, persist_directory, embedder).await?;
        Ok(Self { splitter, storage, top_k: DEFAULT_TOP_K })
    }

    pub async fn from_settings(settings: &RagSettings) -> Result<Self> {
        let embedder = get_default_embedder()?;
        Self::from_settings_with_embedder(settings, embedder).await
    }

    pub async fn from_settings_with_embedder(settings: &RagSettings, embedder: Box<dyn Embedder>) -> Result<Self> {
        settings.validate()?;
        let splitter = TextSplitter::new(SplitterConfig::from_settings(settings))?;
        let persist = settings.persist_path();
        let storage = LanceStorage::open(&settings.collection_name, persist.as_deref(), embedder)
            .await?
            .with_distance(settings.distance)
            .with_batch_size(settings.embed_batch_size);
        Ok(Self { splitter, storage, top_k: settings.top_k })
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    pub fn storage(&self) -> &LanceStorage {
        &self.storage
    }

    /// `top_k` used by callers that do not pick one.
    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Split each text with `split_type` and store the chunks. The i-th
    /// metadata entry is copied onto every chunk of the i-th text; texts past
    /// the end of `metadatas` get none. Returns the number of chunks stored.
    pub async fn add_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        metadatas: Option<&[Metadata]>,
        split_type: SplitType,
    ) -> Result<usize> {
        if texts.is_empty() {
            return Ok(0);
        }
        let metadatas = metadatas.unwrap_or(&[]);
        let mut chunks = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let mut doc_chunks = self.splitter.split(text.as_ref(), split_type)?;
            if let Some(meta) = metadatas.get(i) {
                doc_chunks.iter_mut().for_each(|c| c.inherit(meta));
            }
            chunks.extend(doc_chunks);
        }
        let stored = self.add_chunks(chunks).await?;
        tracing::info!(
            collection = %self.storage.name(),
            documents = texts.len(),
            chunks = stored,
            split_type = %split_type,
            "added texts"
        );
        Ok(stored)
    }

    /// [`add_texts`](Self::add_texts) with the split strategy given by name
    /// (`"text"`, `"markdown"`, `"html"`, `"json"`).
    pub async fn add_texts_with_tag<S: AsRef<str>>(
        &self,
        texts: &[S],
        metadatas: Option<&[Metadata]>,
        tag: &str,
    ) -> Result<usize> {
        let split_type: SplitType = tag.parse()?;
        self.add_texts(texts, metadatas, split_type).await
    }

    /// Store already split chunks as they are.
    pub async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let (texts, metadatas): (Vec<String>, Vec<Metadata>) =
            chunks.into_iter().map(|c| (c.text, c.metadata)).unzip();
        let ids = self.storage.add_texts(&texts, Some(metadatas.as_slice()), None).await?;
        Ok(ids.len())
    }

    /// Read and store a file. The file type comes from `file_type` or the
    /// lowercased extension and picks the split strategy; `source` and
    /// `file_type` are added to the metadata. PDFs are split page by page.
    pub async fn add_file(&self, path: &Path, metadata: Option<Metadata>, file_type: Option<&str>) -> Result<usize> {
        let file_type = match file_type {
            Some(t) => t.trim_start_matches('.').to_ascii_lowercase(),
            None => path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default(),
        };
        let source = path.display().to_string();
        let mut metadata = metadata.unwrap_or_default();
        metadata.insert("source".into(), Value::String(source.clone()));
        metadata.insert("file_type".into(), Value::String(file_type.clone()));

        if file_type == "pdf" {
            let owned = path.to_path_buf();
            let pages = tokio::task::spawn_blocking(move || load_pdf_pages(&owned))
                .await
                .map_err(|e| Error::Operation(format!("pdf extraction task failed: {}", e)))??;
            let mut chunks = self.splitter.split_pages(&pages, &source);
            chunks.iter_mut().for_each(|c| c.inherit(&metadata));
            let stored = self.add_chunks(chunks).await?;
            tracing::info!(path = %source, pages = pages.len(), chunks = stored, "added pdf");
            return Ok(stored);
        }

        let text = tokio::fs::read_to_string(path).await.map_err(|e| Error::io(path, e))?;
        self.add_texts(&[text], Some(std::slice::from_ref(&metadata)), SplitType::from_extension(&file_type)).await
    }

    pub async fn query(
        &self,
        query_text: &str,
        top_k: usize,
        where_: Option<&Value>,
        where_document: Option<&Value>,
    ) -> Result<Vec<QueryResult>> {
        self.storage.query(query_text, top_k, where_, where_document).await
    }

    pub async fn delete(&self, where_: Option<&Value>, where_document: Option<&Value>) -> Result<usize> {
        self.storage.delete(where_, where_document).await
    }

    pub async fn update(&self, ids: &[String], texts: Option<&[String]>, metadatas: Option<&[Metadata]>) -> Result<()> {
        self.storage.update(ids, texts, metadatas).await
    }

    pub async fn get_info(&self) -> Result<CollectionInfo> {
        self.storage.info().await
    }

    pub async fn reset(&self) -> Result<()> {
        self.storage.reset().await
    }
}
