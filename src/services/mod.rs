mod embedding;
mod formatter;
mod index_manager;
mod pipeline;
mod source;
pub mod vector_store;

pub use embedding::{Embedder, EmbeddingClient, HealthResponse};
pub use formatter::RecordFormatter;
pub use index_manager::IndexManager;
pub use pipeline::{ChunkOutcome, RunState, UploadPipeline};
pub use source::ChunkedSource;
pub use vector_store::{MemoryIndex, PgVectorBackend, QdrantBackend, VectorIndex, create_backend};
