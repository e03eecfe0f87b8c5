use std::sync::Arc;

use arrow_array::{FixedSizeListArray, RecordBatch, StringArray};

use qvrag_core::{Error, Metadata, Record, Result};

use crate::schema::build_schema;

/// Deterministic id for a chunk: same text, metadata and position in the
/// call always yield the same id, so re-adding a document upserts it.
pub fn chunk_id(text: &str, metadata: &Metadata, position: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.as_bytes());
    hasher.update(&[0]);
    hasher.update(serde_json::Value::Object(metadata.clone()).to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(&(position as u64).to_le_bytes());
    hasher.finalize().to_hex()[..32].to_string()
}

pub fn records_to_batch(records: &[Record], vectors: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
    if records.len() != vectors.len() {
        return Err(Error::Operation(format!(
            "{} records but {} embeddings",
            records.len(),
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim as usize) {
        return Err(Error::embedding(format!("embedding has {} dimensions, expected {}", bad.len(), dim)));
    }
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    let metadata: Vec<String> =
        records.iter().map(|r| serde_json::Value::Object(r.metadata.clone()).to_string()).collect();
    let vectors = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    RecordBatch::try_new(
        build_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
        ],
    )
    .map_err(Error::store)
}
