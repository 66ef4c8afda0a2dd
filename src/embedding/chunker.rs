// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-budget chunk policy.
//!
//! Decides whether a text has to be split before embedding by counting its
//! tokens with the subword vocabulary of a named model. Counting with the
//! wrong vocabulary gives wrong numbers, so every entry point takes the
//! model explicitly. Splitting itself is not performed here.

use tiktoken_rs::CoreBPE;

use crate::errors::{NewsError, Result};

/// Default token budget per text.
pub const DEFAULT_MAX_TOKENS: usize = 8192;

/// Tokenizer model used when configuration names none.
pub const DEFAULT_TOKENIZER_MODEL: &str = "gpt-3.5-turbo";

/// A subword token id.
pub type TokenId = u32;

/// A loaded subword tokenizer bound to one model name.
pub struct Tokenizer {
    model: String,
    bpe: CoreBPE,
}

impl Tokenizer {
    /// Loads the vocabulary used by `model`.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| NewsError::UnsupportedModel(model.to_string()))?;
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Special-token markup such as `<|endoftext|>` is encoded as plain text.
    pub fn tokenize(&self, text: &str) -> Vec<TokenId> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|token| token as TokenId)
            .collect()
    }

    /// Length of [`tokenize`](Self::tokenize).
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Tokenizes `text` with the vocabulary of `model`.
pub fn tokenize(text: &str, model: &str) -> Result<Vec<TokenId>> {
    Ok(Tokenizer::for_model(model)?.tokenize(text))
}

/// Number of tokens in `text` under `model`.
pub fn count_tokens(text: &str, model: &str) -> Result<usize> {
    Ok(Tokenizer::for_model(model)?.count_tokens(text))
}

/// True iff `text` has more than `max_tokens` tokens under `model`.
pub fn should_chunk(text: &str, max_tokens: usize, model: &str) -> Result<bool> {
    Ok(count_tokens(text, model)? > max_tokens)
}

/// Chunk policy with its tokenizer loaded once.
pub struct ChunkPolicy {
    tokenizer: Tokenizer,
    max_tokens: usize,
}

impl ChunkPolicy {
    pub fn new(model: &str, max_tokens: usize) -> Result<Self> {
        Ok(Self {
            tokenizer: Tokenizer::for_model(model)?,
            max_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn should_chunk(&self, text: &str) -> bool {
        self.tokenizer.count_tokens(text) > self.max_tokens
    }
}
