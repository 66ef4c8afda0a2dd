// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection maintenance: count and drop

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::cli::OutputFormat;
use newsvec::config::Config;
use newsvec::output::print_json;

use super::open_pipeline;

pub fn count(config: Config, format: OutputFormat, compact: bool) -> Result<()> {
    let mut pipeline = open_pipeline(config)?;
    pipeline.attach()?;
    let count = pipeline.count()?;
    let collection = pipeline.config().pipeline().collection_name();

    match format {
        OutputFormat::Json => print_json(&json!({ "collection": collection, "count": count }), compact)?,
        OutputFormat::Text => println!("{}", count),
    }
    Ok(())
}

pub fn drop_collection(config: Config, format: OutputFormat, compact: bool) -> Result<()> {
    let mut pipeline = open_pipeline(config)?;
    let store = pipeline.attach()?;
    let removed = store.count()?;
    store.delete_collection()?;
    let collection = store.name().to_string();

    match format {
        OutputFormat::Json => print_json(
            &json!({ "collection": collection, "removed": removed }),
            compact,
        )?,
        OutputFormat::Text => println!(
            "{} Dropped {} ({} entries removed)",
            "✓".green(),
            collection.bold(),
            removed
        ),
    }
    Ok(())
}
