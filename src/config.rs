// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for newsvec
//!
//! Loads configuration from .newsvecrc.toml in current directory or ~/.config/newsvec/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::embedding::storage::DistanceSpace;
use crate::errors::{NewsError, Result};

/// Default sentence-embedding model.
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Default location of the persisted collection.
pub const DEFAULT_PERSIST_DIRECTORY: &str = "./chroma_db";
/// Default collection name.
pub const DEFAULT_COLLECTION_NAME: &str = "rpp_news";
/// Default number of results per query.
pub const DEFAULT_K: usize = 10;

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// fastembed ONNX sentence-embedding model
    #[default]
    Builtin,
    /// Deterministic feature hashing, no model download
    Hashing,
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Embedding model name
    pub model_name: Option<String>,
    /// Directory holding the persisted collection
    pub persist_directory: Option<PathBuf>,
    /// Collection name within the persistence location
    pub collection_name: Option<String>,
    /// Number of results returned when the caller gives none
    pub default_k: Option<usize>,
}

impl PipelineConfig {
    /// Get model name (defaults to sentence-transformers/all-MiniLM-L6-v2)
    pub fn model_name(&self) -> &str {
        self.model_name.as_deref().unwrap_or(DEFAULT_MODEL_NAME)
    }

    /// Get persist directory (defaults to ./chroma_db)
    pub fn persist_directory(&self) -> &Path {
        self.persist_directory
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_PERSIST_DIRECTORY))
    }

    /// Get collection name (defaults to rpp_news)
    pub fn collection_name(&self) -> &str {
        self.collection_name
            .as_deref()
            .unwrap_or(DEFAULT_COLLECTION_NAME)
    }

    /// Get default k (defaults to 10)
    pub fn default_k(&self) -> usize {
        self.default_k.unwrap_or(DEFAULT_K)
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, hashing)
    pub provider: Option<EmbeddingProviderType>,
    /// Texts per inference batch
    pub batch_size: Option<usize>,
    /// Maximum characters of a text fed to the model
    pub max_chars: Option<usize>,
    /// Whether to L2-normalize vectors
    pub normalize: Option<bool>,
    /// Vector dimension for the hashing provider
    pub dimension: Option<usize>,
    /// Directory for downloaded model files
    pub cache_dir: Option<PathBuf>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get hashing dimension (defaults to 384)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(384)
    }

    /// Get model cache directory, if configured
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }
}

/// Chunk policy configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Whether oversized documents are flagged during indexing
    pub enabled: Option<bool>,
    /// Token budget per document
    pub max_tokens: Option<usize>,
    /// Model whose subword vocabulary is used for counting
    pub tokenizer_model: Option<String>,
}

impl ChunkingConfig {
    /// Get enabled (defaults to true)
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Get max tokens (defaults to 8192)
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
            .unwrap_or(crate::embedding::chunker::DEFAULT_MAX_TOKENS)
    }

    /// Get tokenizer model (defaults to gpt-3.5-turbo)
    pub fn tokenizer_model(&self) -> &str {
        self.tokenizer_model
            .as_deref()
            .unwrap_or(crate::embedding::chunker::DEFAULT_TOKENIZER_MODEL)
    }
}

/// Collection store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Distance space used when a collection is created
    pub space: Option<DistanceSpace>,
}

impl StoreConfig {
    /// Get distance space (defaults to cosine)
    pub fn space(&self) -> DistanceSpace {
        self.space.unwrap_or_default()
    }
}

/// Configuration loaded from .newsvecrc.toml or ~/.config/newsvec/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Chunk policy configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .newsvecrc.toml in current directory
    /// 2. ~/.config/newsvec/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_if_present(Path::new(".newsvecrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("newsvec").join("config.toml");
            if let Some(config) = Self::load_if_present(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load configuration from an explicit file. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NewsError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| NewsError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn load_if_present(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match Self::parse(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the pipeline configuration
    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the chunking configuration
    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    /// Get the store configuration
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Override the persistence location, keeping everything else.
    pub fn with_persist_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pipeline.persist_directory = Some(dir.into());
        self
    }

    /// Override the collection name, keeping everything else.
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline.collection_name = Some(name.into());
        self
    }
}
