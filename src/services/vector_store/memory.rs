//! In-process vector index for dry runs and tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::VectorIndex;
use crate::error::IndexError;
use crate::models::{
    EntryMetadata, IndexDescription, IndexEntry, IndexSpec, Metric, QueryMatch, UpsertResult,
    VectorDriver,
};

struct Collection {
    spec: IndexSpec,
    entries: BTreeMap<String, (Vec<f32>, EntryMetadata)>,
}

/// Brute-force store kept in memory; nothing survives the process.
#[derive(Default)]
pub struct MemoryIndex {
    collections: Mutex<HashMap<String, Collection>>,
    create_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_index` calls served.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls served, failed ones included.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Ids stored in `index`, sorted.
    pub fn ids(&self, index: &str) -> Vec<String> {
        self.lock()
            .get(index)
            .map(|c| c.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Collection>> {
        // A panic while holding the lock leaves plain data behind, keep going
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        Metric::Dot => dot,
        Metric::Cosine => {
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                dot / (na * nb)
            }
        }
        Metric::Euclidean => {
            let dist: f32 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt();
            -dist
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }

    async fn list_indexes(&self) -> Result<Vec<String>, IndexError> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), IndexError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.lock();
        if collections.contains_key(&spec.name) {
            return Err(IndexError::Collection(format!(
                "index already exists: {}",
                spec.name
            )));
        }
        collections.insert(
            spec.name.clone(),
            Collection {
                spec: spec.clone(),
                entries: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>, IndexError> {
        Ok(self.lock().get(name).map(|c| IndexDescription {
            name: name.to_string(),
            dimension: Some(c.spec.dimension),
            entry_count: c.entries.len() as u64,
        }))
    }

    async fn upsert(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertResult, IndexError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.lock();
        let collection = collections
            .get_mut(index)
            .ok_or_else(|| IndexError::Unavailable(format!("index not found: {index}")))?;

        let dimension = collection.spec.dimension as usize;
        if let Some(bad) = entries.iter().find(|e| e.values.len() != dimension) {
            return Err(IndexError::Upsert(format!(
                "vector for {} has dimension {}, index expects {}",
                bad.id,
                bad.values.len(),
                dimension
            )));
        }

        let upserted_count = entries.len();
        for entry in entries {
            collection
                .entries
                .insert(entry.id, (entry.values, entry.metadata));
        }
        Ok(UpsertResult { upserted_count })
    }

    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let collections = self.lock();
        let collection = collections
            .get(index)
            .ok_or_else(|| IndexError::Query(format!("index not found: {index}")))?;

        let mut matches: Vec<QueryMatch> = collection
            .entries
            .iter()
            .map(|(id, (values, metadata))| QueryMatch {
                id: id.clone(),
                score: score(collection.spec.metric, &vector, values),
                row_index: Some(metadata.row_index),
                text: Some(metadata.text.clone()),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k as usize);
        Ok(matches)
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(dimension: u64) -> IndexSpec {
        IndexSpec {
            name: "cars".to_string(),
            dimension,
            metric: Metric::Cosine,
            provisioning: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let index = MemoryIndex::new();
        index.create_index(&spec(2)).await.unwrap();

        let entries = vec![
            IndexEntry::new(0, vec![1.0, 0.0], "Name: ford", 512),
            IndexEntry::new(1, vec![0.0, 1.0], "Name: fiat", 512),
        ];
        let result = index.upsert("cars", entries).await.unwrap();
        assert_eq!(result.upserted_count, 2);

        let matches = index.query("cars", vec![0.1, 0.9], 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "row-1");
        assert_eq!(matches[0].text.as_deref(), Some("Name: fiat"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = MemoryIndex::new();
        index.create_index(&spec(1)).await.unwrap();

        index
            .upsert("cars", vec![IndexEntry::new(5, vec![1.0], "old", 512)])
            .await
            .unwrap();
        index
            .upsert("cars", vec![IndexEntry::new(5, vec![2.0], "new", 512)])
            .await
            .unwrap();

        assert_eq!(index.ids("cars"), vec!["row-5"]);
        let description = index.describe_index("cars").await.unwrap().unwrap();
        assert_eq!(description.entry_count, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejects_whole_batch() {
        let index = MemoryIndex::new();
        index.create_index(&spec(2)).await.unwrap();

        let entries = vec![
            IndexEntry::new(0, vec![1.0, 0.0], "ok", 512),
            IndexEntry::new(1, vec![1.0], "short", 512),
        ];
        assert!(matches!(
            index.upsert("cars", entries).await,
            Err(IndexError::Upsert(_))
        ));
        assert!(index.ids("cars").is_empty());
    }

    #[tokio::test]
    async fn test_upsert_into_missing_index() {
        let index = MemoryIndex::new();
        let result = index
            .upsert("nope", vec![IndexEntry::new(0, vec![1.0], "x", 512)])
            .await;
        assert!(matches!(result, Err(IndexError::Unavailable(_))));
        assert_eq!(index.upsert_calls(), 1);
    }

    #[test]
    fn test_score_metrics() {
        assert!((score(Metric::Cosine, &[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(score(Metric::Dot, &[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert_eq!(score(Metric::Euclidean, &[0.0, 0.0], &[3.0, 4.0]), -5.0);
        assert_eq!(score(Metric::Cosine, &[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
