// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - token budgeting, vector generation and the vector collection store.

pub mod chunker;
pub mod provider;
pub mod storage;

pub use chunker::{count_tokens, should_chunk, tokenize, ChunkPolicy, Tokenizer, DEFAULT_MAX_TOKENS};
pub use provider::{
    EmbeddingGenerator, EmbeddingProvider, EmbeddingProviderConfig, FastEmbedder, HashingProvider,
};
pub use storage::{
    CollectionEntry, DistanceSpace, MetadataField, MetadataFilter, QueryHit, StoreSettings,
    VectorStore,
};
