use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, SearchResults};
use crate::services::{Embedder, EmbeddingClient, IndexManager, create_backend};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Question or description to look up")]
    pub query: String,

    #[arg(long, short = 'n', default_value_t = 5, help = "Maximum number of results")]
    pub limit: u64,

    #[arg(long, short = 'i', help = "Index to search")]
    pub index: Option<String>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }
    if args.limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let mut config = Config::resolve()?.config;
    if let Some(name) = args.index {
        config.index.name = name;
    }
    config.validate()?;

    let formatter = get_formatter(format);
    let start_time = Instant::now();

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Index: {}", config.index.name);
        eprintln!("  Limit: {}", args.limit);
    }

    let mut embedder = EmbeddingClient::new(&config.embedding)?;
    if config.embedding.dimension.is_none() {
        embedder = embedder.with_expected_dimension(config.index.dimension as usize);
    }
    let backend = create_backend(&config.index)
        .await
        .context("failed to connect to vector index")?;
    let manager = IndexManager::new(backend, config.pipeline.batch_size);

    let embed_start = Instant::now();
    let vector = embedder
        .embed(query)
        .await
        .context("failed to generate query embedding")?;
    let embed_ms = embed_start.elapsed().as_millis();

    let search_start = Instant::now();
    let matches = manager
        .query(&config.index.name, vector, args.limit)
        .await
        .context("search failed")?;
    let search_ms = search_start.elapsed().as_millis();

    if verbose {
        let total_ms = start_time.elapsed().as_millis();
        eprintln!("Timing:");
        eprintln!("  Embedding: {embed_ms}ms");
        eprintln!("  Search: {search_ms}ms");
        eprintln!("  Total: {total_ms}ms");
        eprintln!();
    }

    let duration_ms = start_time.elapsed().as_millis() as u64;
    let results = SearchResults::new(query.to_string(), matches, duration_ms);

    print!("{}", formatter.format_search_results(&results));

    Ok(())
}
