// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// newsvec - Semantic retrieval over news articles
///
/// Indexes batches of news records into a persistent vector collection
/// and answers natural-language queries with the most similar articles.
#[derive(Parser, Debug)]
#[command(name = "newsvec")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Configuration file (overrides .newsvecrc.toml and ~/.config/newsvec/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a JSON batch of news records into the collection
    #[command(alias = "i")]
    Index {
        /// JSON file holding an array of {title, description, link, published}
        file: PathBuf,

        /// Drop the collection before indexing
        #[arg(long)]
        rebuild: bool,
    },

    /// Query the collection with natural-language text
    #[command(alias = "q")]
    Query {
        /// Query text
        text: String,

        /// Number of results (defaults to pipeline.default_k)
        #[arg(short = 'k', long)]
        k: Option<usize>,

        /// Only return articles whose metadata field equals a value (field=value, repeatable)
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
    },

    /// Index a batch, then query it
    Run {
        /// JSON file holding an array of news records
        file: PathBuf,

        /// Query text
        text: String,

        /// Number of results (defaults to pipeline.default_k)
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Print the number of entries in the collection
    Count,

    /// Delete every entry in the collection
    Drop,

    /// Count the tokens of a text and report whether it exceeds the budget
    Tokens {
        /// Text to tokenize
        text: String,

        /// Token budget (defaults to chunking.max_tokens)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Tokenizer model (defaults to chunking.tokenizer_model)
        #[arg(long)]
        model: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_accepts_repeated_filters() {
        let cli = Cli::try_parse_from([
            "newsvec", "query", "inflación", "-k", "3", "--where", "title=A", "--where",
            "link=B", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Query { text, k, filters } => {
                assert_eq!(text, "inflación");
                assert_eq!(k, Some(3));
                assert_eq!(filters, vec!["title=A", "link=B"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
