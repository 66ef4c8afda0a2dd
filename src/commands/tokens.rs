// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token counting against the chunk budget

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::OutputFormat;
use newsvec::config::Config;
use newsvec::embedding::Tokenizer;
use newsvec::output::print_json;

#[derive(Debug, Serialize)]
struct TokenReport<'a> {
    model: &'a str,
    tokens: usize,
    max_tokens: usize,
    should_chunk: bool,
}

pub fn run(
    config: &Config,
    text: &str,
    max_tokens: Option<usize>,
    model: Option<&str>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let model = model.unwrap_or_else(|| config.chunking().tokenizer_model());
    let max_tokens = max_tokens.unwrap_or_else(|| config.chunking().max_tokens());
    let tokenizer = Tokenizer::for_model(model)?;
    let tokens = tokenizer.count_tokens(text);
    let report = TokenReport {
        model,
        tokens,
        max_tokens,
        should_chunk: tokens > max_tokens,
    };

    match format {
        OutputFormat::Json => print_json(&report, compact)?,
        OutputFormat::Text => {
            let verdict = if report.should_chunk {
                "over budget".red().to_string()
            } else {
                "within budget".green().to_string()
            };
            println!(
                "{} tokens ({}, max {}): {}",
                report.tokens.to_string().cyan(),
                report.model,
                report.max_tokens,
                verdict
            );
        }
    }
    Ok(())
}
