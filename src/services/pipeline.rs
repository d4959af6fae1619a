//! Upload orchestration: source chunks in, index entries out.

use chrono::Utc;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Instant;

use super::embedding::Embedder;
use super::formatter::RecordFormatter;
use super::index_manager::IndexManager;
use super::source::ChunkedSource;
use crate::error::{ConfigError, EmbeddingError, PipelineError};
use crate::models::{Config, IndexEntry, IndexSpec, Record, RunReport};

/// Counters carried from one chunk to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    /// Rows consumed so far, dropped rows included
    pub total_rows: u64,
    pub uploaded_ids: Vec<String>,
}

/// What happened to a single chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub rows: usize,
    pub incomplete: usize,
    pub embedding_failures: usize,
    pub upsert_calls: usize,
    pub uploaded: usize,
    pub failed_batches: usize,
    pub failed_entries: usize,
}

pub struct UploadPipeline<E: Embedder> {
    embedder: E,
    index: IndexManager,
    formatter: RecordFormatter,
    spec: IndexSpec,
    chunk_size: usize,
    delimiter: u8,
    concurrency: usize,
    max_text_chars: usize,
    progress: Option<ProgressBar>,
}

impl<E: Embedder> UploadPipeline<E> {
    pub fn new(embedder: E, index: IndexManager, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            embedder,
            index,
            formatter: RecordFormatter::from_config(&config.pipeline),
            spec: config.index.spec(),
            chunk_size: config.pipeline.chunk_size,
            delimiter: config.pipeline.delimiter_byte()?,
            concurrency: config.embedding.concurrency,
            max_text_chars: config.pipeline.max_text_chars,
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn index_spec(&self) -> &IndexSpec {
        &self.spec
    }

    /// Open `path` and upload every row of it.
    ///
    /// The source is opened before the index is touched, so a missing file
    /// leaves the index untouched.
    pub async fn upload(&self, path: &Path) -> Result<RunReport, PipelineError> {
        let source = ChunkedSource::open(path, self.chunk_size, self.delimiter)?;
        self.run(source).await
    }

    /// Drive `source` to exhaustion and summarize the run.
    pub async fn run(&self, source: ChunkedSource) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let mut report = RunReport {
            started_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        self.index
            .ensure_index(&self.spec)
            .await
            .map_err(PipelineError::IndexSetup)?;

        tracing::info!(
            source = %source.path().display(),
            index = %self.spec.name,
            chunk_size = source.chunk_size(),
            batch_size = self.index.batch_size(),
            "Starting upload"
        );

        let mut state = RunState::default();

        for chunk in source {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(error = %e, "Source became unreadable, stopping");
                    report.read_error = Some(e.to_string());
                    break;
                }
            };

            report.chunks += 1;
            let (next, outcome) = self.process_chunk(state, chunk).await;
            state = next;

            report.rows_incomplete += outcome.incomplete as u64;
            report.embedding_failures += outcome.embedding_failures as u64;
            report.failed_batches += outcome.failed_batches as u64;
            report.failed_entries += outcome.failed_entries as u64;

            if let Some(ref pb) = self.progress {
                pb.set_message(format!(
                    "chunk {} | {} rows | {} uploaded",
                    report.chunks,
                    state.total_rows,
                    state.uploaded_ids.len()
                ));
                pb.tick();
            }
        }

        report.total_rows = state.total_rows;
        report.uploaded_ids = state.uploaded_ids;
        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            total_rows = report.total_rows,
            uploaded = report.uploaded_count(),
            duration_ms = report.duration_ms,
            "Upload finished"
        );

        Ok(report)
    }

    /// Filter, format, embed and upsert one chunk.
    ///
    /// Ids use the record's offset in the unfiltered chunk, and `total_rows`
    /// advances by the unfiltered length, so dropped rows leave gaps.
    pub async fn process_chunk(
        &self,
        state: RunState,
        chunk: Vec<Record>,
    ) -> (RunState, ChunkOutcome) {
        let RunState {
            total_rows,
            mut uploaded_ids,
        } = state;

        let rows = chunk.len();
        let complete = self.formatter.retain_complete(chunk);
        let incomplete = rows - complete.len();
        if incomplete > 0 {
            tracing::debug!(chunk_start = total_rows, incomplete, "Skipped incomplete rows");
        }

        let (row_indexes, texts): (Vec<u64>, Vec<String>) = complete
            .iter()
            .map(|(offset, record)| (total_rows + *offset as u64, self.formatter.format(record)))
            .unzip();

        let vectors = self.embedder.embed_all(&texts, self.concurrency).await;

        let dimension = self.spec.dimension as usize;
        let mut embedding_failures = 0;
        let mut entries = Vec::with_capacity(vectors.len());
        for ((row_index, text), result) in row_indexes.into_iter().zip(&texts).zip(vectors) {
            // A wrong-width vector would fail its whole upsert batch
            let result = result.and_then(|values| {
                if values.len() == dimension {
                    Ok(values)
                } else {
                    Err(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: values.len(),
                    })
                }
            });
            match result {
                Ok(values) => {
                    entries.push(IndexEntry::new(row_index, values, text, self.max_text_chars))
                }
                Err(e) => {
                    embedding_failures += 1;
                    tracing::warn!(row = row_index, error = %e, "Embedding failed, skipping row");
                }
            }
        }

        let mut outcome = ChunkOutcome {
            rows,
            incomplete,
            embedding_failures,
            ..Default::default()
        };

        let mut pending = entries.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<IndexEntry> = pending.by_ref().take(self.index.batch_size()).collect();
            let ids: Vec<String> = batch.iter().map(|e| e.id.clone()).collect();

            outcome.upsert_calls += 1;
            match self.index.upsert(&self.spec.name, batch).await {
                Ok(result) => {
                    tracing::info!(
                        index = %self.spec.name,
                        count = result.upserted_count,
                        first = ids.first().map(String::as_str).unwrap_or_default(),
                        "Upserted batch"
                    );
                    outcome.uploaded += ids.len();
                    uploaded_ids.extend(ids);
                }
                Err(e) => {
                    tracing::warn!(
                        index = %self.spec.name,
                        count = ids.len(),
                        first = ids.first().map(String::as_str).unwrap_or_default(),
                        error = %e,
                        "Upsert failed, skipping batch"
                    );
                    outcome.failed_batches += 1;
                    outcome.failed_entries += ids.len();
                }
            }
        }

        tracing::info!(
            chunk_start = total_rows,
            rows,
            uploaded = outcome.uploaded,
            "Processed chunk"
        );

        let state = RunState {
            total_rows: total_rows + rows as u64,
            uploaded_ids,
        };
        (state, outcome)
    }
}
