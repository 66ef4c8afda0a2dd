// SPDX-License-Identifier: MIT OR Apache-2.0

//! newsvec - Semantic retrieval over news articles
//!
//! Embeds news records with a local sentence-embedding model, keeps them in
//! a persisted collection and answers top-k similarity queries.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with NEWSVEC_LOG env var (e.g., NEWSVEC_LOG=debug newsvec query "lluvias")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("NEWSVEC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let compact = cli.compact;

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "newsvec", &mut std::io::stdout());
        return Ok(());
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Index { file, rebuild } => {
            commands::index::run(config, &file, rebuild, format, compact)?;
        }
        Commands::Query { text, k, filters } => {
            commands::query::run(config, &text, k, &filters, format, compact)?;
        }
        Commands::Run { file, text, k } => {
            commands::query::run_pipeline(config, &file, &text, k, format, compact)?;
        }
        Commands::Count => {
            commands::collection::count(config, format, compact)?;
        }
        Commands::Drop => {
            commands::collection::drop_collection(config, format, compact)?;
        }
        Commands::Tokens {
            text,
            max_tokens,
            model,
        } => {
            commands::tokens::run(&config, &text, max_tokens, model.as_deref(), format, compact)?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
