use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported split_type: {0}")]
    UnsupportedSplitType(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding failed: {0}")]
    Embedding(#[source] BoxError),

    #[error("Vector store error: {0}")]
    Store(#[source] BoxError),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn embedding<E: Into<BoxError>>(err: E) -> Self {
        Self::Embedding(err.into())
    }

    pub fn store<E: Into<BoxError>>(err: E) -> Self {
        Self::Store(err.into())
    }

    /// True when the failure came from the backing vector store rather than
    /// from the caller's input.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
