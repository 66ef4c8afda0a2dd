// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query the collection and print matching articles

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cli::OutputFormat;
use newsvec::config::Config;
use newsvec::embedding::MetadataFilter;
use newsvec::news::load_news_file;
use newsvec::output::{print_json, use_colors, write_result};
use newsvec::QueryResult;

use super::open_pipeline;

/// Parses repeated `field=value` clauses into one conjunctive filter.
pub fn parse_filters(clauses: &[String]) -> Result<Option<MetadataFilter>> {
    if clauses.is_empty() {
        return Ok(None);
    }
    let mut filter = MetadataFilter::new();
    for clause in clauses {
        filter = filter.with_clause(clause)?;
    }
    Ok(Some(filter))
}

pub fn run(
    config: Config,
    text: &str,
    k: Option<usize>,
    filters: &[String],
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let filter = parse_filters(filters)?;
    let k = k.unwrap_or_else(|| config.pipeline().default_k());
    let mut pipeline = open_pipeline(config)?;
    pipeline.attach()?;
    let result = pipeline.query_where(text, k, filter.as_ref())?;
    print_result(text, &result, format, compact)
}

/// `index` followed by `query`, in one process.
pub fn run_pipeline(
    config: Config,
    file: &Path,
    text: &str,
    k: Option<usize>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let records = load_news_file(file)?;
    let k = k.unwrap_or_else(|| config.pipeline().default_k());
    let mut pipeline = open_pipeline(config)?;
    let result = pipeline.run_pipeline(&records, text, k)?;
    print_result(text, &result, format, compact)
}

fn print_result(text: &str, result: &QueryResult, format: OutputFormat, compact: bool) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(result, compact)?,
        OutputFormat::Text => {
            if result.is_empty() {
                println!("{} No articles found for: {}", "✗".red(), text.yellow());
                return Ok(());
            }
            let mut stdout = std::io::stdout().lock();
            write_result(&mut stdout, result, use_colors())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_clauses_means_no_filter() {
        assert!(parse_filters(&[]).unwrap().is_none());
    }

    #[test]
    fn malformed_clause_is_rejected() {
        assert!(parse_filters(&["title".to_string()]).is_err());
        assert!(parse_filters(&["color=red".to_string()]).is_err());
    }

    #[test]
    fn clauses_combine() {
        let filter = parse_filters(&["title=A".to_string(), "link=B".to_string()])
            .unwrap()
            .unwrap();
        assert!(!filter.is_empty());
    }
}
