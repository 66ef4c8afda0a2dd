// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index a news batch into the collection

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use newsvec::config::Config;
use newsvec::news::load_news_file;
use newsvec::output::print_json;
use newsvec::pipeline::IndexReport;

use super::open_pipeline;

#[derive(Debug, Serialize)]
struct IndexSummary<'a> {
    collection: &'a str,
    #[serde(flatten)]
    report: &'a IndexReport,
    total: usize,
}

pub fn run(
    config: Config,
    file: &Path,
    rebuild: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let records = load_news_file(file)?;
    let mut pipeline = open_pipeline(config)?;
    let documents = pipeline.load_and_process(&records);

    let report = if rebuild {
        pipeline.rebuild_vectorstore(&documents)?
    } else {
        let pb = ProgressBar::new(documents.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} articles | Embedding")?
                .progress_chars("##."),
        );
        let report = pipeline.create_vectorstore_with_progress(&documents, |done| {
            pb.set_position(done as u64)
        });
        pb.finish_and_clear();
        report?
    };

    let total = pipeline
        .count()
        .context("Failed to count collection entries")?;
    let collection = pipeline.config().pipeline().collection_name();

    match format {
        OutputFormat::Json => {
            let summary = IndexSummary {
                collection,
                report: &report,
                total,
            };
            print_json(&summary, compact)?;
        }
        OutputFormat::Text => {
            if !report.oversized.is_empty() {
                eprintln!(
                    "Warning: {} articles exceed the token budget",
                    report.oversized.len()
                );
            }
            if report.skipped_duplicates > 0 {
                println!(
                    "{} Indexed {} articles into {} ({} duplicates skipped, {} total)",
                    "✓".green(),
                    report.indexed.to_string().cyan(),
                    collection.bold(),
                    report.skipped_duplicates.to_string().dimmed(),
                    total
                );
            } else {
                println!(
                    "{} Indexed {} articles into {} ({} total)",
                    "✓".green(),
                    report.indexed.to_string().cyan(),
                    collection.bold(),
                    total
                );
            }
        }
    }

    Ok(())
}
