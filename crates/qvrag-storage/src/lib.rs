//! qvrag-storage
//!
//! A named collection of (id, text, metadata, vector) rows in LanceDB. Text is
//! embedded with the collection's [`Embedder`] on write and on query; ranking
//! is left to LanceDB. Chroma-style `where` / `where_document` filters are
//! evaluated on the decoded rows.

use std::collections::HashSet;
use std::path::Path;

use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use serde_json::Value;
use tempfile::TempDir;

use qvrag_core::config::Distance;
use qvrag_core::filter::RecordFilter;
use qvrag_core::traits::Embedder;
use qvrag_core::{CollectionInfo, Error, Metadata, QueryResult, Record, Result};

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use writer::chunk_id;

const DEFAULT_BATCH_SIZE: usize = 64;

pub struct LanceStorage {
    name: String,
    table: Table,
    embedder: Box<dyn Embedder>,
    dim: i32,
    distance: Distance,
    batch_size: usize,
    // ephemeral collections live in a directory removed on drop
    _tmp: Option<TempDir>,
}

impl LanceStorage {
    /// Open (or create) `collection_name` under `persist_directory`, or in a
    /// private temporary directory when none is given.
    pub async fn open(
        collection_name: &str,
        persist_directory: Option<&Path>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        if collection_name.trim().is_empty() {
            return Err(Error::InvalidConfig("collection name must not be empty".into()));
        }
        let (dir, tmp) = match persist_directory {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
                (dir.to_path_buf(), None)
            }
            None => {
                let tmp = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };
        let dim = i32::try_from(embedder.dim())
            .map_err(|_| Error::InvalidConfig(format!("embedding dimension {} too large", embedder.dim())))?;
        let db = table::open_db(dir.to_string_lossy().as_ref()).await?;
        let table = table::ensure_table(&db, collection_name, dim).await?;
        tracing::info!(
            collection = collection_name,
            path = %dir.display(),
            persistent = tmp.is_none(),
            dim,
            "opened collection"
        );
        Ok(Self {
            name: collection_name.to_string(),
            table,
            embedder,
            dim,
            distance: Distance::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            _tmp: tmp,
        })
    }

    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    /// Number of texts embedded per embedder call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Embed and upsert `texts`. Returns the ids written, in input order.
    pub async fn add_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        metadatas: Option<&[Metadata]>,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(ids) = ids {
            if ids.len() != texts.len() {
                return Err(Error::InvalidInput(format!(
                    "got {} ids for {} texts",
                    ids.len(),
                    texts.len()
                )));
            }
            ensure_unique_ids(ids)?;
        }
        let metadatas = metadatas.unwrap_or(&[]);
        if metadatas.len() > texts.len() {
            return Err(Error::InvalidInput(format!(
                "got {} metadata entries for {} texts",
                metadatas.len(),
                texts.len()
            )));
        }
        let records: Vec<Record> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let text = text.as_ref();
                let metadata = metadatas.get(i).cloned().unwrap_or_default();
                let id = match ids {
                    Some(ids) => ids[i].clone(),
                    None => chunk_id(text, &metadata, i),
                };
                Record { id, text: text.to_string(), metadata }
            })
            .collect();
        self.write(&records).await?;
        tracing::debug!(collection = %self.name, rows = records.len(), "added texts");
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn write(&self, records: &[Record]) -> Result<()> {
        for group in records.chunks(self.batch_size) {
            let texts: Vec<String> = group.iter().map(|r| r.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            let batch = writer::records_to_batch(group, &vectors, self.dim)?;
            table::upsert(&self.table, batch).await?;
        }
        Ok(())
    }

    /// Nearest `top_k` rows to `query_text`, closest first.
    pub async fn query(
        &self,
        query_text: &str,
        top_k: usize,
        where_: Option<&Value>,
        where_document: Option<&Value>,
    ) -> Result<Vec<QueryResult>> {
        let filter = RecordFilter::parse(where_, where_document)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let total = self.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_query(query_text)?;
        // filters run after ranking, so a filtered query ranks the whole collection
        let limit = if filter.is_empty() { top_k.min(total) } else { total };
        let stream = self
            .table
            .vector_search(vector)
            .map_err(Error::store)?
            .distance_type(distance_type(self.distance))
            .limit(limit)
            .execute()
            .await
            .map_err(Error::store)?;
        let mut results = search::collect_results(stream).await?;
        if !filter.is_empty() {
            results.retain(|r| filter.matches(&r.text, &r.metadata));
        }
        results.truncate(top_k);
        tracing::debug!(collection = %self.name, top_k, hits = results.len(), "query");
        Ok(results)
    }

    /// Stored rows for `ids`, in the order given. Unknown ids are skipped.
    pub async fn get(&self, ids: &[String]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut found = Vec::with_capacity(ids.len());
        for group in ids.chunks(256) {
            let stream = self
                .table
                .query()
                .only_if(table::id_predicate(group))
                .limit(group.len())
                .execute()
                .await
                .map_err(Error::store)?;
            found.extend(search::collect_records(stream).await?);
        }
        Ok(ids.iter().filter_map(|id| found.iter().find(|r| &r.id == id).cloned()).collect())
    }

    /// Replace text (re-embedding it) and/or metadata of existing rows.
    pub async fn update(
        &self,
        ids: &[String],
        texts: Option<&[String]>,
        metadatas: Option<&[Metadata]>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        if texts.is_some_and(|t| t.len() != ids.len()) || metadatas.is_some_and(|m| m.len() != ids.len()) {
            return Err(Error::InvalidInput("update needs one text and one metadata entry per id".into()));
        }
        ensure_unique_ids(ids)?;
        let mut records = self.get(ids).await?;
        if records.len() != ids.len() {
            let missing: Vec<&str> = ids
                .iter()
                .filter(|id| !records.iter().any(|r| &r.id == *id))
                .map(String::as_str)
                .collect();
            return Err(Error::NotFound(format!("ids not in collection '{}': {}", self.name, missing.join(", "))));
        }
        for (i, record) in records.iter_mut().enumerate() {
            if let Some(texts) = texts {
                record.text = texts[i].clone();
            }
            if let Some(metadatas) = metadatas {
                record.metadata = metadatas[i].clone();
            }
        }
        self.write(&records).await?;
        tracing::debug!(collection = %self.name, rows = records.len(), "updated rows");
        Ok(())
    }

    /// Delete rows matching the filters. Without any filter nothing is
    /// deleted. Returns the number of rows removed.
    pub async fn delete(&self, where_: Option<&Value>, where_document: Option<&Value>) -> Result<usize> {
        let filter = RecordFilter::parse(where_, where_document)?;
        if filter.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = self
            .scan()
            .await?
            .into_iter()
            .filter(|r| filter.matches(&r.text, &r.metadata))
            .map(|r| r.id)
            .collect();
        if !ids.is_empty() {
            table::delete_ids(&self.table, &ids).await?;
        }
        tracing::info!(collection = %self.name, deleted = ids.len(), "deleted rows");
        Ok(ids.len())
    }

    pub async fn delete_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        table::delete_ids(&self.table, ids).await
    }

    async fn scan(&self) -> Result<Vec<Record>> {
        let total = self.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }
        let stream = self.table.query().limit(total).execute().await.map_err(Error::store)?;
        search::collect_records(stream).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(Error::store)
    }

    pub async fn info(&self) -> Result<CollectionInfo> {
        Ok(CollectionInfo { name: self.name.clone(), count: self.count().await? })
    }

    /// Remove every row, keeping the collection itself.
    pub async fn reset(&self) -> Result<()> {
        self.table.delete("true").await.map_err(Error::store)?;
        tracing::info!(collection = %self.name, "collection reset");
        Ok(())
    }
}

fn ensure_unique_ids(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(id.as_str())) {
        Some(dup) => Err(Error::InvalidInput(format!("duplicate id '{}'", dup))),
        None => Ok(()),
    }
}

fn distance_type(distance: Distance) -> DistanceType {
    match distance {
        Distance::L2 => DistanceType::L2,
        Distance::Cosine => DistanceType::Cosine,
        Distance::Dot => DistanceType::Dot,
    }
}
