//! Domain types shared by the splitter, storage and engine crates.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Open-ended metadata attached to a document and copied onto its chunks.
///
/// Keys keep their insertion order so stored metadata round-trips unchanged.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A contiguous span of text produced by a splitting strategy.
///
/// `metadata` holds what the strategy itself knows about the span (header
/// titles, page numbers); document-level metadata is merged in later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: Metadata) -> Self {
        Self { text: text.into(), metadata }
    }

    /// Merge `doc` into this chunk's metadata. Document keys replace chunk keys
    /// of the same name.
    pub fn inherit(&mut self, doc: &Metadata) {
        for (k, v) in doc {
            self.metadata.insert(k.clone(), v.clone());
        }
    }
}

/// A stored row as seen by callers: identity, payload and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Metadata,
}

/// One match returned by a query, in the order ranked by the vector store.
///
/// `distance` is whatever the store reports (lower is closer); it is never
/// recomputed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Metadata,
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
}

impl CollectionInfo {
    /// Placeholder reported by callers that choose to degrade when the store
    /// cannot be reached.
    pub fn unknown() -> Self {
        Self { name: "unknown".to_string(), count: 0 }
    }
}
