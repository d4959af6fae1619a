use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::output::get_formatter;
use crate::error::{AppError, ConfigError};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::{ChunkedSource, EmbeddingClient, IndexManager, UploadPipeline, create_backend};

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(required = true, help = "Delimited file with a header row")]
    pub path: PathBuf,

    #[arg(long, help = "Rows read per chunk")]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "Entries sent per upsert call")]
    pub batch_size: Option<usize>,

    #[arg(long, short = 'i', help = "Target index name")]
    pub index: Option<String>,

    #[arg(
        long,
        help = "Embed everything but upsert into an in-memory index instead of the configured one"
    )]
    pub dry_run: bool,
}

impl UploadArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.chunk_size {
            config.pipeline.chunk_size = n;
        }
        if let Some(n) = self.batch_size {
            config.pipeline.batch_size = n;
        }
        if let Some(ref name) = self.index {
            config.index.name = name.clone();
        }
        if self.dry_run {
            config.index.driver = VectorDriver::Memory;
        }
    }

    /// Apply the flags on top of `config`, then validate the result.
    fn prepare_config(&self, mut config: Config) -> Result<Config, ConfigError> {
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Wire the embedding client, the index backend and the pipeline from `config`.
async fn build_pipeline(config: &Config) -> Result<UploadPipeline<EmbeddingClient>, AppError> {
    let retry = config.retry.to_retry_config();
    let mut embedder = EmbeddingClient::new(&config.embedding)?.with_retry(retry.clone());
    if config.embedding.dimension.is_none() {
        embedder = embedder.with_expected_dimension(config.index.dimension as usize);
    }

    let backend = create_backend(&config.index).await?;
    let manager = IndexManager::new(backend, config.pipeline.batch_size).with_retry(retry);

    Ok(UploadPipeline::new(embedder, manager, config)?)
}

pub async fn handle_upload(args: UploadArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = args.prepare_config(Config::resolve()?.config)?;

    let formatter = get_formatter(format);

    // Opened before any backend exists so a bad path never touches the index
    let source = ChunkedSource::open(
        &args.path,
        config.pipeline.chunk_size,
        config.pipeline.delimiter_byte()?,
    )?;

    if verbose {
        eprintln!("Source: {}", args.path.display());
        eprintln!("  Columns: {}", source.headers().join(", "));
        eprintln!(
            "  Index: {} ({}, {})",
            config.index.name, config.index.driver, config.index.metric
        );
    }

    let mut pipeline = build_pipeline(&config)
        .await
        .context("failed to set up upload")?;

    let progress = if format == OutputFormat::Json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pipeline = pipeline.with_progress(pb.clone());
        Some(pb)
    };

    let report = pipeline.run(source).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = report.context("upload aborted")?;
    print!("{}", formatter.format_run_report(&report));

    if args.dry_run {
        eprintln!("Dry run: nothing was written to {}", config.index.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = UploadArgs {
            path: PathBuf::from("auto-mpg.csv"),
            chunk_size: Some(10),
            batch_size: Some(5),
            index: Some("cars-test".to_string()),
            dry_run: true,
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.pipeline.chunk_size, 10);
        assert_eq!(config.pipeline.batch_size, 5);
        assert_eq!(config.index.name, "cars-test");
        assert_eq!(config.index.driver, VectorDriver::Memory);
    }

    #[test]
    fn test_absent_args_keep_config() {
        let args = UploadArgs {
            path: PathBuf::from("auto-mpg.csv"),
            chunk_size: None,
            batch_size: None,
            index: None,
            dry_run: false,
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.pipeline.chunk_size, 1000);
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.index.driver, VectorDriver::Qdrant);
    }

    #[test]
    fn test_flags_apply_before_validation() {
        let args = UploadArgs {
            path: PathBuf::from("auto-mpg.csv"),
            chunk_size: Some(10),
            batch_size: None,
            index: None,
            dry_run: false,
        };
        let mut base = Config::default();
        base.pipeline.chunk_size = 0;

        let config = args.prepare_config(base).unwrap();
        assert_eq!(config.pipeline.chunk_size, 10);
    }

    #[test]
    fn test_invalid_flag_fails_validation() {
        let args = UploadArgs {
            path: PathBuf::from("auto-mpg.csv"),
            chunk_size: None,
            batch_size: Some(0),
            index: None,
            dry_run: false,
        };

        let result = args.prepare_config(Config::default());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_build_pipeline_in_memory() {
        let mut config = Config::default();
        config.index.driver = VectorDriver::Memory;

        assert!(build_pipeline(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_build_pipeline_reports_config_error() {
        let mut config = Config::default();
        config.index.driver = VectorDriver::Memory;
        config.pipeline.delimiter = '§';

        let result = build_pipeline(&config).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
