use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::{EmbeddingClient, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let (embedding_healthy, embedding_model) = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => match client.health_check().await {
            Ok(health) => (true, health.model_id.or(config.embedding.model.clone())),
            Err(_) => (false, None),
        },
        Err(_) => (false, None),
    };

    let mut status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_healthy,
        embedding_model,
        index_driver: config.index.driver.to_string(),
        index_url: config.index.url.clone(),
        index_connected: false,
        index_name: config.index.name.clone(),
        index_exists: false,
        index_dimension: None,
        entry_count: 0,
    };

    if let Ok(backend) = create_backend(&config.index).await {
        status.index_connected = backend.health_check().await.unwrap_or(false);
        if status.index_connected
            && let Ok(Some(description)) = backend.describe_index(&config.index.name).await
        {
            status.index_exists = true;
            status.index_dimension = description.dimension;
            status.entry_count = description.entry_count;
        }
    }

    print!("{}", formatter.format_status(&status));

    if !status.embedding_healthy || !status.index_connected {
        eprintln!();
        if !status.embedding_healthy {
            eprintln!(
                "Warning: embedding server not reachable at {}",
                config.embedding.url
            );
        }
        if !status.index_connected {
            match config.index.driver {
                VectorDriver::Qdrant => {
                    eprintln!("Warning: Qdrant not running. Start with: docker compose up -d qdrant");
                }
                VectorDriver::PostgreSQL => {
                    eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
                }
                VectorDriver::Memory => {}
            }
        }
    } else if let Some(dimension) = status.index_dimension
        && dimension != u64::from(config.index.dimension)
    {
        eprintln!(
            "\nWarning: index dimension {} differs from configured {}",
            dimension, config.index.dimension
        );
    }

    Ok(())
}
