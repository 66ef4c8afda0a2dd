// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! [`FastEmbedder`] runs a sentence-transformers model through fastembed.
//! [`HashingProvider`] is a deterministic, model-free fallback used for
//! offline runs and tests. [`EmbeddingGenerator`] is the shared handle the
//! pipeline and the collection store both embed through.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::borrow::Cow;
use std::env;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::errors::{NewsError, Result};

const DEFAULT_BATCH_SIZE: usize = 256;
const MAX_BATCH_SIZE: usize = 1024;
const DEFAULT_MAX_CHARS: usize = 2000;

/// Configuration for the embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    pub model_name: String,
    pub batch_size: usize,
    pub max_chars: usize,
    pub normalize: bool,
}

impl EmbeddingProviderConfig {
    /// Builds the provider config from file settings, then applies
    /// `NEWSVEC_EMBED_*` environment overrides.
    pub fn resolve(model_name: &str, config: &EmbeddingConfig) -> Result<Self> {
        let mut batch_size = parse_usize_env(
            "NEWSVEC_EMBED_BATCH_SIZE",
            config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        )?;
        if batch_size == 0 {
            batch_size = DEFAULT_BATCH_SIZE;
        }
        if batch_size > MAX_BATCH_SIZE {
            warn!(
                "batch_size={} exceeds max {}; clamping.",
                batch_size, MAX_BATCH_SIZE
            );
            batch_size = MAX_BATCH_SIZE;
        }

        let mut max_chars = parse_usize_env(
            "NEWSVEC_EMBED_MAX_CHARS",
            config.max_chars.unwrap_or(DEFAULT_MAX_CHARS),
        )?;
        if max_chars == 0 {
            max_chars = DEFAULT_MAX_CHARS;
        }

        let normalize = parse_bool_env("NEWSVEC_EMBED_NORMALIZE", config.normalize.unwrap_or(true))?;

        Ok(Self {
            model_name: model_name.to_string(),
            batch_size,
            max_chars,
            normalize,
        })
    }
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            model_name: crate::config::DEFAULT_MODEL_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_chars: DEFAULT_MAX_CHARS,
            normalize: true,
        }
    }
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Returns the batch size used by the provider.
    fn batch_size(&self) -> usize;

    /// Generates embeddings for the given texts, one per text, in order.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| NewsError::Embedding("No embedding returned".to_string()))
    }
}

/// A fastembed model known to this crate, with its output dimension.
#[derive(Debug, Clone)]
pub struct BuiltinModel {
    pub model: EmbeddingModel,
    pub dimension: usize,
}

/// Maps a model name to a fastembed model.
pub fn resolve_builtin_model(name: &str) -> Result<BuiltinModel> {
    let normalized = name.trim().to_lowercase();
    let (model, dimension) = match normalized.as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "all-minilm-l12-v2" | "sentence-transformers/all-minilm-l12-v2" => {
            (EmbeddingModel::AllMiniLML12V2, 384)
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "paraphrase-multilingual-minilm-l12-v2"
        | "sentence-transformers/paraphrase-multilingual-minilm-l12-v2" => {
            (EmbeddingModel::ParaphraseMLMiniLML12V2, 384)
        }
        "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
            (EmbeddingModel::MultilingualE5Small, 384)
        }
        _ => {
            return Err(NewsError::ModelLoad {
                model: name.to_string(),
                reason: "unknown model name".to_string(),
            })
        }
    };
    Ok(BuiltinModel { model, dimension })
}

/// FastEmbed provider for sentence-transformers models.
pub struct FastEmbedder {
    embedder: TextEmbedding,
    config: EmbeddingProviderConfig,
    dimension: usize,
}

impl FastEmbedder {
    pub fn new(config: EmbeddingProviderConfig, cache_dir: Option<&std::path::Path>) -> Result<Self> {
        let builtin = resolve_builtin_model(&config.model_name)?;
        let mut init = InitOptions::new(builtin.model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            init = init.with_cache_dir(dir.to_path_buf());
        }
        let embedder = TextEmbedding::try_new(init).map_err(|e| NewsError::ModelLoad {
            model: config.model_name.clone(),
            reason: e.to_string(),
        })?;
        info!(model = %config.model_name, dimension = builtin.dimension, "loaded embedding model");

        Ok(Self {
            embedder,
            config,
            dimension: builtin.dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.config.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let mut embeddings = self
            .embedder
            .embed(&prepared, Some(self.config.batch_size))
            .map_err(|e| NewsError::Embedding(e.to_string()))?;

        if self.config.normalize {
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

/// Feature-hashing provider: each lowercase word adds a signed unit to one
/// bucket chosen by its blake3 hash. Texts sharing words get similar vectors.
pub struct HashingProvider {
    model: String,
    dimension: usize,
    batch_size: usize,
    max_chars: usize,
    normalize: bool,
}

impl HashingProvider {
    /// Creates a hashing provider with the specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self::with_config(dimension, &EmbeddingProviderConfig::default())
    }

    pub fn with_config(dimension: usize, config: &EmbeddingProviderConfig) -> Self {
        Self {
            model: format!("hashing-{}", dimension),
            dimension,
            batch_size: config.batch_size,
            max_chars: config.max_chars,
            normalize: config.normalize,
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let text = truncate_to_chars(text, self.max_chars).to_lowercase();
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = blake3::hash(word.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket_bytes = [0_u8; 8];
            bucket_bytes.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        if self.normalize {
            l2_normalize(&mut vector);
        }
        vector
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Shared handle to a loaded embedding provider.
///
/// Cloning is cheap and every clone embeds through the same loaded model, so
/// the pipeline and its collection store never load a model twice.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<Mutex<Box<dyn EmbeddingProvider>>>,
    model_id: String,
    dimension: usize,
    batch_size: usize,
}

impl std::fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingGenerator {
    /// Loads the provider selected by `config` for `model_name`.
    pub fn initialize(model_name: &str, config: &EmbeddingConfig) -> Result<Self> {
        let provider_config = EmbeddingProviderConfig::resolve(model_name, config)?;
        let provider: Box<dyn EmbeddingProvider> = match config.provider() {
            EmbeddingProviderType::Builtin => {
                Box::new(FastEmbedder::new(provider_config, config.cache_dir())?)
            }
            EmbeddingProviderType::Hashing => Box::new(HashingProvider::with_config(
                config.dimension(),
                &provider_config,
            )),
        };
        Ok(Self::from_provider(provider))
    }

    pub fn from_provider(provider: Box<dyn EmbeddingProvider>) -> Self {
        let model_id = provider.model_id().to_string();
        let dimension = provider.dimension();
        let batch_size = provider.batch_size().max(1);
        Self {
            provider: Arc::new(Mutex::new(provider)),
            model_id,
            dimension,
            batch_size,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| NewsError::Embedding("No embedding returned".to_string()))
    }

    /// Embeds `texts` in order; empty input yields empty output.
    pub fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut provider = self
            .provider
            .lock()
            .map_err(|_| NewsError::Embedding("embedding provider lock poisoned".to_string()))?;
        let vectors = provider.embed_texts(texts)?;
        drop(provider);

        if vectors.len() != texts.len() {
            return Err(NewsError::Embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(NewsError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        debug!(count = texts.len(), model = %self.model_id, "embedded texts");
        Ok(vectors)
    }
}

fn truncate_texts<'a>(texts: &'a [String], max_chars: usize) -> Vec<Cow<'a, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars<'a>(input: &'a str, max_chars: usize) -> Cow<'a, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .map_err(|_| NewsError::Config(format!("Invalid {} value: {}", name, value)))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(NewsError::Config(format!("Failed to read {}: {}", name, err))),
    }
}

fn parse_bool_env(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_lowercase();
            if value.is_empty() {
                return Ok(default);
            }
            match value.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(NewsError::Config(format!("Invalid {} value: {}", name, other))),
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(NewsError::Config(format!("Failed to read {}: {}", name, err))),
    }
}
