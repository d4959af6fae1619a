//! CLI module for rowvec.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Load tabular records into a vector index and query them.
#[derive(Debug, Parser)]
#[command(name = "rowvec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed every complete row of a file and upsert it into the index
    Upload(commands::UploadArgs),

    /// Find the rows closest to a question
    Search(commands::SearchArgs),

    /// Check embedding server and vector index
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "rowvec",
            "--format",
            "json",
            "upload",
            "auto-mpg.csv",
            "--chunk-size",
            "200",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.chunk_size, Some(200));
                assert!(args.dry_run);
                assert!(args.batch_size.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_search_limit() {
        let cli = Cli::try_parse_from(["rowvec", "search", "fuel efficient", "-n", "3"]).unwrap();
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "fuel efficient");
                assert_eq!(args.limit, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
