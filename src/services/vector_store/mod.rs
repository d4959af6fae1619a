//! Vector index abstraction layer.
//!
//! Backends (Qdrant, PostgreSQL/pgvector, in-process memory) implement
//! [`VectorIndex`]; the pipeline only ever sees the trait.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::MemoryIndex;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::IndexError;
use crate::models::{
    IndexConfig, IndexDescription, IndexEntry, IndexSpec, QueryMatch, UpsertResult, VectorDriver,
};

/// Remote store surface used by the upload pipeline and the search command.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Check if the store is reachable.
    async fn health_check(&self) -> Result<bool, IndexError>;

    /// Names of all indexes the store knows about.
    async fn list_indexes(&self) -> Result<Vec<String>, IndexError>;

    /// Create an index. Callers check existence first.
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), IndexError>;

    /// Dimension and size of an index, `None` if it does not exist.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>, IndexError>;

    /// Insert or replace entries by id. Either all entries are stored or the
    /// call fails.
    async fn upsert(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertResult, IndexError>;

    /// Nearest entries to `vector`, best first.
    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<QueryMatch>, IndexError>;

    fn driver(&self) -> VectorDriver;
}

/// Create the backend selected by configuration.
pub async fn create_backend(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>, IndexError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config)?;
            Ok(Arc::new(backend))
        }
        VectorDriver::PostgreSQL => {
            let backend = PgVectorBackend::new(config).await?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Memory => Ok(Arc::new(MemoryIndex::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let config = IndexConfig {
            driver: VectorDriver::Memory,
            ..Default::default()
        };
        let backend = create_backend(&config).await.unwrap();
        assert_eq!(backend.driver(), VectorDriver::Memory);
        assert!(backend.health_check().await.unwrap());
        assert!(backend.list_indexes().await.unwrap().is_empty());
    }
}
