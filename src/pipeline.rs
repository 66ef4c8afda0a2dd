// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval pipeline: news records in, ranked news rows out.
//!
//! The pipeline owns no persisted state. It holds the loaded embedding
//! model, an optional chunk policy and, once indexed, a bound
//! [`VectorStore`]. Until `create_vectorstore` (or `attach`) binds a
//! collection, queries fail with [`NewsError::NotInitialized`].
//!
//! Re-indexing is incremental: entry ids are derived from each article, so
//! calling `create_vectorstore` again upserts in place. `rebuild_vectorstore`
//! swaps the whole collection for the new batch in one transaction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::chunker::ChunkPolicy;
use crate::embedding::provider::EmbeddingGenerator;
use crate::embedding::storage::{MetadataFilter, QueryHit, StoreSettings, VectorStore};
use crate::errors::{NewsError, Result};
use crate::news::{DocumentMetadata, IndexableDocument, NewsRecord};

/// One row of a query result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub title: String,
    pub description: String,
    pub link: String,
    pub date_published: String,
}

impl From<&DocumentMetadata> for ResultRow {
    fn from(metadata: &DocumentMetadata) -> Self {
        Self {
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            link: metadata.link.clone(),
            date_published: metadata.published.clone(),
        }
    }
}

/// Query output, closest match first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult {
    rows: Vec<ResultRow>,
}

impl QueryResult {
    /// Column names, in output order.
    pub const COLUMNS: [&'static str; 4] = ["title", "description", "link", "date_published"];

    fn from_hits(hits: &[QueryHit]) -> Self {
        Self {
            rows: hits.iter().map(|hit| ResultRow::from(&hit.metadata)).collect(),
        }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}

impl IntoIterator for QueryResult {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Summary of one indexing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Entries written to the collection
    pub indexed: usize,
    /// Documents dropped because an earlier document in the batch had the same id
    pub skipped_duplicates: usize,
    /// Ids of documents over the token budget
    pub oversized: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexMode {
    Upsert,
    Replace,
}

/// End-to-end news retrieval pipeline.
pub struct RetrievalPipeline {
    config: Config,
    embedder: EmbeddingGenerator,
    chunk_policy: Option<ChunkPolicy>,
    store: Option<VectorStore>,
}

impl RetrievalPipeline {
    /// Loads the configured embedding model and chunk policy.
    pub fn new(config: Config) -> Result<Self> {
        let embedder =
            EmbeddingGenerator::initialize(config.pipeline().model_name(), config.embeddings())?;
        Self::with_embedder(config, embedder)
    }

    /// Builds a pipeline around an already loaded embedding model.
    pub fn with_embedder(config: Config, embedder: EmbeddingGenerator) -> Result<Self> {
        let chunk_policy = if config.chunking().enabled() {
            Some(ChunkPolicy::new(
                config.chunking().tokenizer_model(),
                config.chunking().max_tokens(),
            )?)
        } else {
            None
        };

        Ok(Self {
            config,
            embedder,
            chunk_policy,
            store: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &EmbeddingGenerator {
        &self.embedder
    }

    /// Whether a collection is bound and queries are allowed.
    pub fn is_indexed(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&VectorStore> {
        self.store.as_ref()
    }

    /// Turns records into indexable documents, one per record, in order.
    pub fn load_and_process(&self, records: &[NewsRecord]) -> Vec<IndexableDocument> {
        records.iter().map(IndexableDocument::from_record).collect()
    }

    /// Binds the configured collection without writing to it.
    pub fn attach(&mut self) -> Result<&mut VectorStore> {
        if self.store.is_none() {
            let settings = StoreSettings::new(
                self.config.pipeline().persist_directory(),
                self.config.pipeline().collection_name(),
            )
            .with_space(self.config.store().space());
            self.store = Some(VectorStore::open(&settings, self.embedder.clone())?);
        }
        self.store.as_mut().ok_or(NewsError::NotInitialized)
    }

    /// Binds the collection and upserts `documents` into it.
    pub fn create_vectorstore(&mut self, documents: &[IndexableDocument]) -> Result<IndexReport> {
        self.create_vectorstore_with_progress(documents, |_| {})
    }

    /// Like [`create_vectorstore`](Self::create_vectorstore), reporting the
    /// number of documents embedded so far after every batch.
    pub fn create_vectorstore_with_progress<F: FnMut(usize)>(
        &mut self,
        documents: &[IndexableDocument],
        progress: F,
    ) -> Result<IndexReport> {
        self.index(documents, IndexMode::Upsert, progress)
    }

    /// Replaces the whole collection with `documents`.
    pub fn rebuild_vectorstore(&mut self, documents: &[IndexableDocument]) -> Result<IndexReport> {
        self.index(documents, IndexMode::Replace, |_| {})
    }

    fn index<F: FnMut(usize)>(
        &mut self,
        documents: &[IndexableDocument],
        mode: IndexMode,
        mut progress: F,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        let mut seen = HashSet::with_capacity(documents.len());
        let mut ids = Vec::with_capacity(documents.len());
        let mut contents = Vec::with_capacity(documents.len());
        let mut metadatas = Vec::with_capacity(documents.len());
        for doc in documents {
            let id = doc.stable_id();
            if !seen.insert(id.clone()) {
                report.skipped_duplicates += 1;
                continue;
            }
            if let Some(policy) = &self.chunk_policy {
                if policy.should_chunk(&doc.content) {
                    warn!(
                        id = %id,
                        title = %doc.metadata.title,
                        max_tokens = policy.max_tokens(),
                        "document exceeds token budget; embedding truncated input"
                    );
                    report.oversized.push(id.clone());
                }
            }
            ids.push(id);
            contents.push(doc.content.clone());
            metadatas.push(doc.metadata.clone());
        }

        let batch_size = self.embedder.batch_size();
        let mut embeddings = Vec::with_capacity(contents.len());
        for batch in contents.chunks(batch_size) {
            embeddings.extend(self.embedder.embed_many(batch)?);
            progress(embeddings.len());
        }

        let store = self.attach()?;
        match mode {
            IndexMode::Upsert => {
                store.upsert(&contents, &metadatas, Some(&embeddings), Some(&ids))?;
            }
            IndexMode::Replace => {
                store.replace_all(&contents, &metadatas, Some(&embeddings), Some(&ids))?;
            }
        }
        report.indexed = ids.len();

        info!(
            collection = %store.name(),
            indexed = report.indexed,
            skipped_duplicates = report.skipped_duplicates,
            oversized = report.oversized.len(),
            mode = ?mode,
            "indexed documents"
        );
        Ok(report)
    }

    /// Returns the `k` documents nearest to `query_text`.
    pub fn query(&self, query_text: &str, k: usize) -> Result<QueryResult> {
        self.query_where(query_text, k, None)
    }

    /// Like [`query`](Self::query), restricted to entries matching `filter`.
    pub fn query_where(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<QueryResult> {
        let store = self.store.as_ref().ok_or(NewsError::NotInitialized)?;
        let hits = store
            .query(&[query_text.to_string()], k, filter)?
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(QueryResult::from_hits(&hits))
    }

    /// `load_and_process`, then `create_vectorstore`, then `query`.
    pub fn run_pipeline(
        &mut self,
        records: &[NewsRecord],
        query_text: &str,
        k: usize,
    ) -> Result<QueryResult> {
        let documents = self.load_and_process(records);
        self.create_vectorstore(&documents)?;
        self.query(query_text, k)
    }

    /// Number of entries in the bound collection.
    pub fn count(&self) -> Result<usize> {
        self.store
            .as_ref()
            .ok_or(NewsError::NotInitialized)?
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::provider::HashingProvider;
    use tempfile::tempdir;

    fn pipeline(dir: &std::path::Path) -> RetrievalPipeline {
        let config = Config::default().with_persist_directory(dir);
        let embedder = EmbeddingGenerator::from_provider(Box::new(HashingProvider::new(128)));
        RetrievalPipeline::with_embedder(config, embedder).unwrap()
    }

    fn record(title: &str, description: &str) -> NewsRecord {
        NewsRecord::new(
            title,
            description,
            format!("https://rpp.pe/{}", title.to_lowercase()),
            "Tue, 14 May 2024 10:00:00 -0500",
        )
    }

    #[test]
    fn load_and_process_keeps_order() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let docs = pipeline.load_and_process(&[record("A", "first"), record("B", "second")]);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "A. first");
        assert_eq!(docs[1].metadata.title, "B");
    }

    #[test]
    fn query_before_index_fails() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        assert!(matches!(
            pipeline.query("anything", 3),
            Err(NewsError::NotInitialized)
        ));
        assert!(!pipeline.is_indexed());
        assert!(!dir.path().join(crate::embedding::storage::STORE_FILE).exists());
    }

    #[test]
    fn reindexing_upserts_in_place() {
        let dir = tempdir().unwrap();
        let mut pipeline = pipeline(dir.path());
        let docs = pipeline.load_and_process(&[
            record("A", "first"),
            record("B", "second"),
            record("A", "duplicate link"),
        ]);

        let report = pipeline.create_vectorstore(&docs).unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(pipeline.count().unwrap(), 2);

        pipeline.create_vectorstore(&docs).unwrap();
        assert_eq!(pipeline.count().unwrap(), 2);

        pipeline.rebuild_vectorstore(&docs[..1]).unwrap();
        assert_eq!(pipeline.count().unwrap(), 1);
    }

    #[test]
    fn oversized_documents_are_reported() {
        let dir = tempdir().unwrap();
        let mut config = Config::default().with_persist_directory(dir.path());
        config.chunking.max_tokens = Some(6);
        let embedder = EmbeddingGenerator::from_provider(Box::new(HashingProvider::new(32)));
        let mut pipeline = RetrievalPipeline::with_embedder(config, embedder).unwrap();

        let docs = pipeline.load_and_process(&[
            record("Short", ""),
            record("Long", "a description with many more words than the budget allows"),
        ]);
        let report = pipeline.create_vectorstore(&docs).unwrap();
        assert_eq!(report.oversized, vec![docs[1].stable_id()]);
        assert_eq!(report.indexed, 2);
    }

    #[test]
    fn unknown_tokenizer_model_fails_at_construction() {
        let dir = tempdir().unwrap();
        let mut config = Config::default().with_persist_directory(dir.path());
        config.chunking.tokenizer_model = Some("no-such-tokenizer".to_string());
        let embedder = EmbeddingGenerator::from_provider(Box::new(HashingProvider::new(32)));
        assert!(matches!(
            RetrievalPipeline::with_embedder(config, embedder),
            Err(NewsError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn result_serializes_with_fixed_columns() {
        let result = QueryResult {
            rows: vec![ResultRow {
                title: "T".to_string(),
                description: "D".to_string(),
                link: "L".to_string(),
                date_published: "P".to_string(),
            }],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"[{"title":"T","description":"D","link":"L","date_published":"P"}]"#
        );
    }
}
