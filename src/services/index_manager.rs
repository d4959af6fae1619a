//! Index provisioning and bounded upserts on top of a [`VectorIndex`].

use std::sync::Arc;

use super::vector_store::VectorIndex;
use crate::error::IndexError;
use crate::models::{IndexEntry, IndexSpec, QueryMatch, UpsertResult};
use crate::utils::retry::{RetryConfig, retry};

pub struct IndexManager {
    backend: Arc<dyn VectorIndex>,
    batch_size: usize,
    retry: RetryConfig,
}

impl IndexManager {
    pub fn new(backend: Arc<dyn VectorIndex>, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
            retry: RetryConfig::disabled(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Largest batch accepted by [`IndexManager::upsert`].
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn backend(&self) -> &dyn VectorIndex {
        self.backend.as_ref()
    }

    /// Create the index unless one with the same name already exists.
    pub async fn ensure_index(&self, spec: &IndexSpec) -> Result<(), IndexError> {
        let existing = self.backend.list_indexes().await?;

        if existing.iter().any(|name| name == &spec.name) {
            tracing::debug!(index = %spec.name, "Index already exists");
            self.check_dimension(spec).await;
            return Ok(());
        }

        tracing::info!(
            index = %spec.name,
            dimension = spec.dimension,
            metric = %spec.metric,
            "Creating index"
        );
        self.backend.create_index(spec).await
    }

    async fn check_dimension(&self, spec: &IndexSpec) {
        match self.backend.describe_index(&spec.name).await {
            Ok(Some(description)) => {
                if let Some(actual) = description.dimension
                    && actual != spec.dimension
                {
                    tracing::warn!(
                        index = %spec.name,
                        expected = spec.dimension,
                        actual,
                        "Existing index has a different dimension, upserts will fail"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(index = %spec.name, error = %e, "Could not describe index"),
        }
    }

    /// Upsert one batch as a unit.
    pub async fn upsert(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertResult, IndexError> {
        if entries.len() > self.batch_size {
            return Err(IndexError::BatchTooLarge {
                size: entries.len(),
                limit: self.batch_size,
            });
        }
        if entries.is_empty() {
            return Ok(UpsertResult::default());
        }

        if !self.retry.is_enabled() {
            return self.backend.upsert(index, entries).await;
        }

        retry(&self.retry, "upsert", || {
            self.backend.upsert(index, entries.clone())
        })
        .await
    }

    pub async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        self.backend.query(index, vector, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metric;
    use crate::services::vector_store::MemoryIndex;
    use std::time::Duration;

    fn spec(dimension: u64) -> IndexSpec {
        IndexSpec {
            name: "car-data-index".to_string(),
            dimension,
            metric: Metric::Cosine,
            provisioning: Default::default(),
        }
    }

    fn entries(n: u64) -> Vec<IndexEntry> {
        (0..n)
            .map(|i| IndexEntry::new(i, vec![1.0, 0.0], "Name: amc hornet", 512))
            .collect()
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let memory = Arc::new(MemoryIndex::new());
        let manager = IndexManager::new(memory.clone(), 50);

        manager.ensure_index(&spec(2)).await.unwrap();
        manager.ensure_index(&spec(2)).await.unwrap();

        assert_eq!(memory.list_indexes().await.unwrap(), vec!["car-data-index"]);
        assert_eq!(memory.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_index_gets_no_create_call() {
        let memory = Arc::new(MemoryIndex::new());
        memory.create_index(&spec(2)).await.unwrap();
        let manager = IndexManager::new(memory.clone(), 50);

        manager.ensure_index(&spec(2)).await.unwrap();

        assert_eq!(memory.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_not_fatal() {
        let memory = Arc::new(MemoryIndex::new());
        memory.create_index(&spec(3)).await.unwrap();
        let manager = IndexManager::new(memory.clone(), 50);

        assert!(manager.ensure_index(&spec(2)).await.is_ok());
        assert_eq!(memory.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected_before_backend() {
        let memory = Arc::new(MemoryIndex::new());
        let manager = IndexManager::new(memory.clone(), 50);
        manager.ensure_index(&spec(2)).await.unwrap();

        let result = manager.upsert("car-data-index", entries(51)).await;

        assert!(matches!(
            result,
            Err(IndexError::BatchTooLarge {
                size: 51,
                limit: 50
            })
        ));
        assert_eq!(memory.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_upsert_full_batch() {
        let memory = Arc::new(MemoryIndex::new());
        let manager = IndexManager::new(memory.clone(), 50);
        manager.ensure_index(&spec(2)).await.unwrap();

        let result = manager.upsert("car-data-index", entries(50)).await.unwrap();

        assert_eq!(result.upserted_count, 50);
        assert_eq!(memory.ids("car-data-index").len(), 50);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_backend() {
        let memory = Arc::new(MemoryIndex::new());
        let manager = IndexManager::new(memory.clone(), 50);

        let result = manager.upsert("car-data-index", Vec::new()).await.unwrap();

        assert_eq!(result.upserted_count, 0);
        assert_eq!(memory.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_on_unavailable_index() {
        let memory = Arc::new(MemoryIndex::new());
        let manager = IndexManager::new(memory.clone(), 50)
            .with_retry(RetryConfig::new(3).with_initial_delay(Duration::from_millis(1)));

        // The index was never created, so every attempt is Unavailable
        let result = manager.upsert("car-data-index", entries(1)).await;

        assert!(matches!(result, Err(IndexError::Unavailable(_))));
        assert_eq!(memory.upsert_calls(), 3);
    }
}
