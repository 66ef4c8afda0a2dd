// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the newsvec library.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewsError>;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read news batch {}: {source}", path.display())]
    ReadBatch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed news batch {}: {source}", path.display())]
    ParseBatch {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Length mismatch: {documents} documents but {actual} {field}")]
    LengthMismatch {
        field: &'static str,
        documents: usize,
        actual: usize,
    },

    #[error("No tokenizer known for model '{0}'")]
    UnsupportedModel(String),

    #[error("Failed to load embedding model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate id '{0}'")]
    DuplicateId(String),

    #[error("Collection '{collection}' uses {existing} distance; requested {requested} (rebuild the collection to change it)")]
    SpaceMismatch {
        collection: String,
        existing: String,
        requested: String,
    },

    #[error("Vector store not initialized. Call create_vectorstore first.")]
    NotInitialized,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
