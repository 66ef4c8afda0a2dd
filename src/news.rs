// SPDX-License-Identifier: MIT OR Apache-2.0

//! News records and the documents derived from them.
//!
//! A batch file is a JSON array of objects with `title`, `description`,
//! `link` and `published` string fields. Each record becomes one
//! [`IndexableDocument`] whose content is `"{title}. {description}"`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{NewsError, Result};

/// A parsed news item as produced by a feed loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub title: String,
    pub description: String,
    pub link: String,
    /// Publication date as given by the feed; not normalized.
    pub published: String,
}

impl NewsRecord {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
        published: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            link: link.into(),
            published: published.into(),
        }
    }
}

/// Metadata stored alongside each collection entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub link: String,
    pub published: String,
    pub description: String,
}

impl From<&NewsRecord> for DocumentMetadata {
    fn from(record: &NewsRecord) -> Self {
        Self {
            title: record.title.clone(),
            link: record.link.clone(),
            published: record.published.clone(),
            description: record.description.clone(),
        }
    }
}

/// Text plus metadata, ready to be embedded and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexableDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl IndexableDocument {
    pub fn from_record(record: &NewsRecord) -> Self {
        Self {
            content: format_for_embedding(record),
            metadata: DocumentMetadata::from(record),
        }
    }

    /// Stable identifier for this document.
    ///
    /// Derived from the link, or from title and description when the link is
    /// empty, so the same article maps to the same collection entry across runs.
    pub fn stable_id(&self) -> String {
        let hash = if self.metadata.link.trim().is_empty() {
            let mut hasher = blake3::Hasher::new();
            hasher.update(self.metadata.title.as_bytes());
            hasher.update(&[0x1f]);
            hasher.update(self.metadata.description.as_bytes());
            hasher.finalize()
        } else {
            blake3::hash(self.metadata.link.trim().as_bytes())
        };
        hash.to_hex()[..32].to_string()
    }
}

/// Text fed to the embedding model for a record.
pub fn format_for_embedding(record: &NewsRecord) -> String {
    format!("{}. {}", record.title, record.description)
}

/// Loads a batch of news records from a JSON file.
pub fn load_news_file(path: impl AsRef<Path>) -> Result<Vec<NewsRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| NewsError::ReadBatch {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| NewsError::ParseBatch {
        path: path.to_path_buf(),
        source,
    })
}
