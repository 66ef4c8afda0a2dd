// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-based vector collection store.
//!
//! A persistence directory holds one database file with any number of named
//! collections. Each collection has a distance space fixed at creation and a
//! dimension fixed by its first write. Entries are (id, document, metadata,
//! embedding) tuples; similarity search is brute force over the candidates
//! that pass the metadata filter.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::embedding::provider::EmbeddingGenerator;
use crate::errors::{NewsError, Result};
use crate::news::DocumentMetadata;

/// Database file created inside the persistence directory.
pub const STORE_FILE: &str = "collections.sqlite";

/// Distance function used to rank neighbors. Smaller is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceSpace {
    /// 1 - cosine similarity
    #[default]
    Cosine,
    /// Squared euclidean distance
    L2,
    /// 1 - inner product
    Ip,
}

impl DistanceSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceSpace::Cosine => "cosine",
            DistanceSpace::L2 => "l2",
            DistanceSpace::Ip => "ip",
        }
    }

    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceSpace::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceSpace::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceSpace::Ip => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

impl std::fmt::Display for DistanceSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DistanceSpace {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceSpace::Cosine),
            "l2" => Ok(DistanceSpace::L2),
            "ip" => Ok(DistanceSpace::Ip),
            other => Err(NewsError::InvalidInput(format!(
                "Unknown distance space: {}",
                other
            ))),
        }
    }
}

/// A metadata field that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Title,
    Link,
    Published,
    Description,
}

impl MetadataField {
    fn column(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Link => "link",
            MetadataField::Published => "published",
            MetadataField::Description => "description",
        }
    }

    pub fn value_of<'a>(&self, metadata: &'a DocumentMetadata) -> &'a str {
        match self {
            MetadataField::Title => &metadata.title,
            MetadataField::Link => &metadata.link,
            MetadataField::Published => &metadata.published,
            MetadataField::Description => &metadata.description,
        }
    }
}

impl std::str::FromStr for MetadataField {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(MetadataField::Title),
            "link" => Ok(MetadataField::Link),
            "published" | "date_published" => Ok(MetadataField::Published),
            "description" => Ok(MetadataField::Description),
            other => Err(NewsError::InvalidInput(format!(
                "Unknown metadata field: {}",
                other
            ))),
        }
    }
}

/// Conjunction of metadata equality clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    clauses: Vec<(MetadataField, String)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `field == value` clause.
    pub fn and_eq(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        self.clauses.push((field, value.into()));
        self
    }

    /// Parses a `field=value` clause and adds it.
    pub fn with_clause(self, clause: &str) -> Result<Self> {
        let (field, value) = clause.split_once('=').ok_or_else(|| {
            NewsError::InvalidInput(format!("Filter must look like field=value: {}", clause))
        })?;
        Ok(self.and_eq(field.parse()?, value))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| field.value_of(metadata) == value)
    }
}

/// A stored collection entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub id: String,
    pub document: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
}

/// One neighbor returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: DocumentMetadata,
    /// Distance to the query under the collection's space
    pub distance: f32,
}

/// Where and how a collection is opened.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub persist_directory: PathBuf,
    pub collection_name: String,
    pub space: DistanceSpace,
}

impl StoreSettings {
    pub fn new(persist_directory: impl Into<PathBuf>, collection_name: impl Into<String>) -> Self {
        Self {
            persist_directory: persist_directory.into(),
            collection_name: collection_name.into(),
            space: DistanceSpace::default(),
        }
    }

    pub fn with_space(mut self, space: DistanceSpace) -> Self {
        self.space = space;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Add,
    Upsert,
    Replace,
}

/// A named, persisted vector collection.
///
/// The store embeds documents and query texts through its own
/// [`EmbeddingGenerator`] when the caller supplies no vectors. Writes are
/// single-writer; concurrent writers must be serialized by the caller.
pub struct VectorStore {
    conn: Connection,
    path: PathBuf,
    name: String,
    space: DistanceSpace,
    dimension: Option<usize>,
    embedder: EmbeddingGenerator,
}

impl VectorStore {
    /// Opens the collection, creating the directory, database and collection
    /// as needed.
    pub fn open(settings: &StoreSettings, embedder: EmbeddingGenerator) -> Result<Self> {
        if settings.collection_name.trim().is_empty() {
            return Err(NewsError::InvalidInput(
                "collection name must not be empty".to_string(),
            ));
        }

        std::fs::create_dir_all(&settings.persist_directory)?;
        let path = settings.persist_directory.join(STORE_FILE);
        let conn = Connection::open(&path)?;

        let mut store = Self {
            conn,
            path,
            name: settings.collection_name.clone(),
            space: settings.space,
            dimension: None,
            embedder,
        };
        store.init_schema()?;
        store.ensure_collection()?;

        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                space TEXT NOT NULL,
                dimension INTEGER,
                model TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                published TEXT NOT NULL,
                description TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', '1')",
            [],
        )?;
        Ok(())
    }

    /// Get-or-create for this store's collection name.
    fn ensure_collection(&mut self) -> Result<()> {
        let existing: Option<(String, Option<i64>, String)> = self
            .conn
            .query_row(
                "SELECT space, dimension, model FROM collections WHERE name = ?1",
                params![self.name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match existing {
            Some((space, dimension, model)) => {
                if space != self.space.as_str() {
                    return Err(NewsError::SpaceMismatch {
                        collection: self.name.clone(),
                        existing: space,
                        requested: self.space.to_string(),
                    });
                }
                if model != self.embedder.model_id() {
                    warn!(
                        collection = %self.name,
                        stored = %model,
                        configured = %self.embedder.model_id(),
                        "collection was built with a different embedding model"
                    );
                }
                self.dimension = dimension.map(|d| d as usize);
                debug!(collection = %self.name, path = %self.path.display(), "opened collection");
            }
            None => {
                self.conn.execute(
                    "INSERT INTO collections (name, space, dimension, model, created_at) VALUES (?1, ?2, NULL, ?3, ?4)",
                    params![self.name, self.space.as_str(), self.embedder.model_id(), unix_now()],
                )?;
                self.dimension = None;
                info!(collection = %self.name, space = %self.space, "created collection");
            }
        }
        Ok(())
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> DistanceSpace {
        self.space
    }

    /// Vector length established by the first write, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn embedder(&self) -> &EmbeddingGenerator {
        &self.embedder
    }

    /// Closes the storage connection explicitly.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    /// Inserts new entries. Fails with `DuplicateId` if any id already
    /// exists or repeats within the batch; nothing is written in that case.
    pub fn add(
        &mut self,
        documents: &[String],
        metadatas: &[DocumentMetadata],
        embeddings: Option<&[Vec<f32>]>,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        self.write(WriteMode::Add, documents, metadatas, embeddings, ids)
    }

    /// Inserts new entries and fully replaces entries whose id exists.
    pub fn upsert(
        &mut self,
        documents: &[String],
        metadatas: &[DocumentMetadata],
        embeddings: Option<&[Vec<f32>]>,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        self.write(WriteMode::Upsert, documents, metadatas, embeddings, ids)
    }

    /// Replaces every entry of the collection with the given batch in one
    /// transaction. The dimension is re-established by the new batch. On
    /// error the previous contents are kept.
    pub fn replace_all(
        &mut self,
        documents: &[String],
        metadatas: &[DocumentMetadata],
        embeddings: Option<&[Vec<f32>]>,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        self.write(WriteMode::Replace, documents, metadatas, embeddings, ids)
    }

    fn write(
        &mut self,
        mode: WriteMode,
        documents: &[String],
        metadatas: &[DocumentMetadata],
        embeddings: Option<&[Vec<f32>]>,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        check_len("metadatas", documents.len(), metadatas.len())?;
        if let Some(embeddings) = embeddings {
            check_len("embeddings", documents.len(), embeddings.len())?;
        }
        if let Some(ids) = ids {
            check_len("ids", documents.len(), ids.len())?;
        }
        if documents.is_empty() && mode != WriteMode::Replace {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = match ids {
            Some(ids) => ids.to_vec(),
            None => documents
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect(),
        };
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if id.is_empty() {
                return Err(NewsError::InvalidInput("ids must not be empty".to_string()));
            }
            if !seen.insert(id.as_str()) {
                return Err(NewsError::DuplicateId(id.clone()));
            }
        }

        let computed;
        let vectors: &[Vec<f32>] = match embeddings {
            Some(embeddings) => embeddings,
            None => {
                computed = self.embedder.embed_many(documents)?;
                &computed
            }
        };
        let established = match mode {
            WriteMode::Replace => None,
            WriteMode::Add | WriteMode::Upsert => self.dimension,
        };
        let dimension = check_dimensions(established, vectors)?;

        let tx = self.conn.transaction()?;
        {
            if mode == WriteMode::Replace {
                tx.execute(
                    "DELETE FROM entries WHERE collection = ?1",
                    params![self.name],
                )?;
            }
            if mode == WriteMode::Add {
                let mut exists = tx.prepare("SELECT 1 FROM entries WHERE collection = ?1 AND id = ?2")?;
                for id in &ids {
                    if exists.exists(params![self.name, id])? {
                        return Err(NewsError::DuplicateId(id.clone()));
                    }
                }
            }

            let sql = match mode {
                WriteMode::Add | WriteMode::Replace => {
                    r#"
                    INSERT INTO entries (collection, id, document, title, link, published, description, embedding)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#
                }
                WriteMode::Upsert => {
                    r#"
                    INSERT INTO entries (collection, id, document, title, link, published, description, embedding)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        document = excluded.document,
                        title = excluded.title,
                        link = excluded.link,
                        published = excluded.published,
                        description = excluded.description,
                        embedding = excluded.embedding
                    "#
                }
            };
            let mut stmt = tx.prepare(sql)?;
            for (((id, document), metadata), embedding) in
                ids.iter().zip(documents).zip(metadatas).zip(vectors)
            {
                stmt.execute(params![
                    self.name,
                    id,
                    document,
                    metadata.title,
                    metadata.link,
                    metadata.published,
                    metadata.description,
                    embedding_to_blob(embedding),
                ])?;
            }

            if established.is_none() {
                let stored = (!ids.is_empty()).then_some(dimension as i64);
                tx.execute(
                    "UPDATE collections SET dimension = ?1 WHERE name = ?2",
                    params![stored, self.name],
                )?;
            }
        }
        tx.commit()?;
        self.dimension = if ids.is_empty() {
            established
        } else {
            Some(dimension)
        };

        debug!(
            collection = %self.name,
            count = ids.len(),
            mode = ?mode,
            "wrote entries"
        );
        Ok(ids)
    }

    /// Embeds each query text and returns up to `n_results` nearest entries
    /// per text, closest first.
    pub fn query(
        &self,
        query_texts: &[String],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Vec<QueryHit>>> {
        if n_results == 0 {
            return Err(NewsError::InvalidInput(
                "n_results must be at least 1".to_string(),
            ));
        }
        let query_embeddings = self.embedder.embed_many(query_texts)?;
        self.query_embeddings(&query_embeddings, n_results, filter)
    }

    /// Nearest-neighbor search with caller-supplied query vectors.
    pub fn query_embeddings(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Vec<QueryHit>>> {
        if n_results == 0 {
            return Err(NewsError::InvalidInput(
                "n_results must be at least 1".to_string(),
            ));
        }
        if let Some(expected) = self.dimension {
            if let Some(bad) = query_embeddings.iter().find(|q| q.len() != expected) {
                return Err(NewsError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }
        check_finite(query_embeddings)?;
        if query_embeddings.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.load_entries(filter)?;
        debug!(
            collection = %self.name,
            queries = query_embeddings.len(),
            candidates = candidates.len(),
            "querying collection"
        );

        let results = query_embeddings
            .iter()
            .map(|query| {
                let mut scored: Vec<(f32, &CollectionEntry)> = candidates
                    .iter()
                    .map(|entry| (self.space.distance(query, &entry.embedding), entry))
                    .collect();
                scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
                scored.truncate(n_results);
                scored
                    .into_iter()
                    .map(|(distance, entry)| QueryHit {
                        id: entry.id.clone(),
                        document: entry.document.clone(),
                        metadata: entry.metadata.clone(),
                        distance,
                    })
                    .collect()
            })
            .collect();

        Ok(results)
    }

    fn load_entries(&self, filter: Option<&MetadataFilter>) -> Result<Vec<CollectionEntry>> {
        let mut sql = String::from(
            "SELECT id, document, title, link, published, description, embedding FROM entries WHERE collection = ?1",
        );
        let mut values: Vec<&str> = vec![self.name.as_str()];
        if let Some(filter) = filter {
            for (field, value) in &filter.clauses {
                values.push(value.as_str());
                sql.push_str(&format!(" AND {} = ?{}", field.column(), values.len()));
            }
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Fetches entries by id, in the given order. Unknown ids are skipped.
    pub fn get(&self, ids: &[String]) -> Result<Vec<CollectionEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, document, title, link, published, description, embedding
            FROM entries
            WHERE collection = ?1 AND id = ?2
            "#,
        )?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = stmt
                .query_row(params![self.name, id], row_to_entry)
                .optional()?
            {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Deletes entries by id and returns how many existed.
    pub fn delete(&mut self, ids: &[String]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM entries WHERE collection = ?1 AND id = ?2")?;
            for id in ids {
                deleted += stmt.execute(params![self.name, id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Number of entries in the collection.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Removes every entry and the collection's configuration. The store
    /// stays usable: the name is immediately recreated as an empty
    /// collection in the configured space.
    pub fn delete_collection(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM entries WHERE collection = ?1",
            params![self.name],
        )?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![self.name])?;
        tx.commit()?;
        info!(collection = %self.name, removed, "deleted collection");

        self.ensure_collection()
    }

    /// Changes the distance space by dropping the collection and
    /// re-inserting every entry under the new space.
    pub fn rebuild_with_space(&mut self, space: DistanceSpace) -> Result<()> {
        let entries = self.load_entries(None)?;
        let dimension = self.dimension;

        let tx = self.conn.transaction()?;
        {
            tx.execute(
                "DELETE FROM entries WHERE collection = ?1",
                params![self.name],
            )?;
            tx.execute("DELETE FROM collections WHERE name = ?1", params![self.name])?;
            tx.execute(
                "INSERT INTO collections (name, space, dimension, model, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.name,
                    space.as_str(),
                    dimension.map(|d| d as i64),
                    self.embedder.model_id(),
                    unix_now()
                ],
            )?;
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO entries (collection, id, document, title, link, published, description, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for entry in &entries {
                stmt.execute(params![
                    self.name,
                    entry.id,
                    entry.document,
                    entry.metadata.title,
                    entry.metadata.link,
                    entry.metadata.published,
                    entry.metadata.description,
                    embedding_to_blob(&entry.embedding),
                ])?;
            }
        }
        tx.commit()?;

        info!(
            collection = %self.name,
            from = %self.space,
            to = %space,
            entries = entries.len(),
            "rebuilt collection"
        );
        self.space = space;
        Ok(())
    }
}

fn check_len(field: &'static str, documents: usize, actual: usize) -> Result<()> {
    if documents != actual {
        return Err(NewsError::LengthMismatch {
            field,
            documents,
            actual,
        });
    }
    Ok(())
}

/// Validates vectors against each other and the established dimension.
fn check_dimensions(established: Option<usize>, vectors: &[Vec<f32>]) -> Result<usize> {
    let expected = match (established, vectors.first()) {
        (Some(d), _) => d,
        (None, Some(first)) => first.len(),
        (None, None) => return Ok(0),
    };
    if expected == 0 {
        return Err(NewsError::InvalidInput(
            "embeddings must not be empty".to_string(),
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(NewsError::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }
    check_finite(vectors)?;
    Ok(expected)
}

fn check_finite(vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.iter().flatten().any(|v| !v.is_finite()) {
        return Err(NewsError::InvalidInput(
            "embeddings must not contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectionEntry> {
    let embedding_blob: Vec<u8> = row.get(6)?;
    Ok(CollectionEntry {
        id: row.get(0)?,
        document: row.get(1)?,
        metadata: DocumentMetadata {
            title: row.get(2)?,
            link: row.get(3)?,
            published: row.get(4)?,
            description: row.get(5)?,
        },
        embedding: blob_to_embedding(&embedding_blob),
    })
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Converts an embedding vector to a compact blob.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Converts a blob back to an embedding vector.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Computes cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
