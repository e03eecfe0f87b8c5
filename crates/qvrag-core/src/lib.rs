//! qvrag-core
//!
//! Shared configuration, error type, domain types, the `Embedder` seam and
//! Chroma-style filter evaluation used by the other qvrag crates.

pub mod config;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, ChunkId, CollectionInfo, Metadata, QueryResult, Record};
