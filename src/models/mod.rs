mod config;
mod entry;
mod record;
mod report;
mod search;

pub use config::{
    Config, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_DIMENSION, DEFAULT_EMBEDDING_URL,
    DEFAULT_INDEX_NAME, DEFAULT_MAX_TEXT_CHARS, DEFAULT_QDRANT_URL, EmbeddingConfig, FieldSpec,
    IndexConfig, OutputConfig, PipelineConfig, ResolvedConfig, RetrySettings, VectorDriver,
};
pub use entry::{
    EntryMetadata, IndexDescription, IndexEntry, IndexSpec, Metric, ProvisioningSpec, UpsertResult,
};
pub use record::{Record, is_missing};
pub use report::RunReport;
pub use search::{OutputFormat, QueryMatch, SearchResults};
