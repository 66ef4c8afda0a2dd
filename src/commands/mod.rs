// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand handlers

pub mod collection;
pub mod index;
pub mod query;
pub mod tokens;

use anyhow::{Context, Result};
use std::path::Path;

use newsvec::config::Config;
use newsvec::RetrievalPipeline;

/// Loads the explicit config file, or falls back to the usual search path.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load_from(path)?),
        None => Ok(Config::load()),
    }
}

/// Builds a pipeline for `config`, loading its embedding model.
pub fn open_pipeline(config: Config) -> Result<RetrievalPipeline> {
    let model = config.pipeline().model_name().to_string();
    RetrievalPipeline::new(config)
        .with_context(|| format!("Failed to initialize pipeline with model {}", model))
}
