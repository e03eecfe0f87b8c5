//! LanceDB connection and table housekeeping.
//!
//! Opening a collection either reuses the existing table (checking that its
//! vector dimension matches the embedder) or creates an empty one.
use arrow_array::{RecordBatch, RecordBatchIterator};
use lancedb::{connect, Connection, Table};

use qvrag_core::{Error, Result};

use crate::schema::{build_schema, vector_dim};

/// Maximum ids per `id IN (...)` predicate.
const PREDICATE_BATCH: usize = 256;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::store)
}

pub async fn ensure_table(conn: &Connection, name: &str, dim: i32) -> Result<Table> {
    let names = conn.table_names().execute().await.map_err(Error::store)?;
    if names.iter().any(|n| n == name) {
        let table = conn.open_table(name).execute().await.map_err(Error::store)?;
        let schema = table.schema().await.map_err(Error::store)?;
        match vector_dim(&schema) {
            Some(existing) if existing == dim => {}
            Some(existing) => {
                return Err(Error::InvalidConfig(format!(
                    "collection '{}' stores {}-dimensional vectors but the embedder produces {}",
                    name, existing, dim
                )))
            }
            None => {
                return Err(Error::InvalidConfig(format!("table '{}' has no vector column", name)))
            }
        }
        return Ok(table);
    }
    // create empty table with 0 rows
    let schema = build_schema(dim);
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    tracing::debug!(table = name, dim, "creating collection table");
    conn.create_table(name, Box::new(iter)).execute().await.map_err(Error::store)
}

/// Insert new rows and replace rows whose id already exists.
pub async fn upsert(table: &Table, batch: RecordBatch) -> Result<()> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    let mut mi = table.merge_insert(&["id"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(Error::store)?;
    Ok(())
}

pub async fn delete_ids(table: &Table, ids: &[String]) -> Result<()> {
    for group in ids.chunks(PREDICATE_BATCH) {
        table.delete(&id_predicate(group)).await.map_err(Error::store)?;
    }
    Ok(())
}

pub fn id_predicate<S: AsRef<str>>(ids: &[S]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{}'", id.as_ref().replace('\'', "''"))).collect();
    format!("id IN ({})", quoted.join(", "))
}
