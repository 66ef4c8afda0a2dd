// SPDX-License-Identifier: MIT OR Apache-2.0

//! newsvec - News embedding and similarity retrieval library
//!
//! Turns news records into embeddings, keeps them in a persisted vector
//! collection and answers "most relevant N items" queries.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod news;
pub mod output;
pub mod pipeline;

pub use errors::{NewsError, Result};
pub use news::{IndexableDocument, NewsRecord};
pub use pipeline::{QueryResult, RetrievalPipeline, ResultRow};
