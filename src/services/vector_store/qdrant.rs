//! Qdrant vector index backend.

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::VectorIndex;
use crate::error::IndexError;
use crate::models::{
    IndexConfig, IndexDescription, IndexEntry, IndexSpec, Metric, QueryMatch, UpsertResult,
    VectorDriver,
};

/// Qdrant vector index backend.
///
/// Qdrant point ids must be integers or UUIDs, so each `row-<n>` id is mapped
/// to a name-based UUID and kept in the payload as `entry_id`.
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let mut builder =
            Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        Ok(Self { client })
    }

    /// Deterministic point id for an entry of `index`.
    pub fn point_id(index: &str, entry_id: &str) -> String {
        let name = format!("{}:{}", index, entry_id);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    fn distance(metric: Metric) -> Distance {
        match metric {
            Metric::Cosine => Distance::Cosine,
            Metric::Euclidean => Distance::Euclid,
            Metric::Dot => Distance::Dot,
        }
    }

    fn to_point(index: &str, entry: IndexEntry) -> PointStruct {
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert("entry_id".to_string(), entry.id.clone().into());
        payload.insert(
            "row_index".to_string(),
            (entry.metadata.row_index as i64).into(),
        );
        payload.insert("text".to_string(), entry.metadata.text.into());

        PointStruct::new(Self::point_id(index, &entry.id), entry.values, payload)
    }

    fn classify(err: QdrantError, fallback: fn(String) -> IndexError) -> IndexError {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("transport")
            || lower.contains("connect")
            || lower.contains("unavailable")
            || lower.contains("deadline")
        {
            IndexError::Unavailable(msg)
        } else {
            fallback(msg)
        }
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn payload_u64(payload: &HashMap<String, Value>, key: &str) -> Option<u64> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::IntegerValue(n)) => u64::try_from(*n).ok(),
        _ => None,
    })
}

#[async_trait]
impl VectorIndex for QdrantBackend {
    async fn health_check(&self) -> Result<bool, IndexError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| IndexError::Unavailable(e.to_string()))
    }

    async fn list_indexes(&self) -> Result<Vec<String>, IndexError> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| Self::classify(e, IndexError::Collection))?;

        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), IndexError> {
        let vectors = VectorParamsBuilder::new(spec.dimension, Self::distance(spec.metric))
            .on_disk(spec.provisioning.on_disk);

        let mut create = CreateCollectionBuilder::new(&spec.name)
            .vectors_config(vectors)
            .on_disk_payload(spec.provisioning.on_disk);
        if let Some(shards) = spec.provisioning.shard_number {
            create = create.shard_number(shards);
        }
        if let Some(replicas) = spec.provisioning.replication_factor {
            create = create.replication_factor(replicas);
        }

        self.client
            .create_collection(create)
            .await
            .map_err(|e| Self::classify(e, IndexError::Collection))?;

        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>, IndexError> {
        match self.client.collection_info(name).await {
            Ok(info) => {
                let result = info.result;
                let dimension = result
                    .as_ref()
                    .and_then(|r| r.config.as_ref())
                    .and_then(|c| c.params.as_ref())
                    .and_then(|p| p.vectors_config.as_ref())
                    .and_then(|vc| match &vc.config {
                        Some(VectorsConfigKind::Params(params)) => Some(params.size),
                        _ => None,
                    });

                Ok(Some(IndexDescription {
                    name: name.to_string(),
                    dimension,
                    entry_count: result.and_then(|r| r.points_count).unwrap_or(0),
                }))
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(Self::classify(e, IndexError::Collection))
                }
            }
        }
    }

    async fn upsert(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertResult, IndexError> {
        if entries.is_empty() {
            return Ok(UpsertResult::default());
        }

        let upserted_count = entries.len();
        let points: Vec<PointStruct> = entries
            .into_iter()
            .map(|entry| Self::to_point(index, entry))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(index, points).wait(true))
            .await
            .map_err(|e| Self::classify(e, IndexError::Upsert))?;

        Ok(UpsertResult { upserted_count })
    }

    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let search = SearchPointsBuilder::new(index, vector, top_k).with_payload(true);

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| Self::classify(e, IndexError::Query))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| QueryMatch {
                id: payload_str(&point.payload, "entry_id").unwrap_or_default(),
                score: point.score,
                row_index: payload_u64(&point.payload, "row_index"),
                text: payload_str(&point.payload, "text"),
            })
            .collect())
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Qdrant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = QdrantBackend::point_id("car-data-index", "row-0");
        let b = QdrantBackend::point_id("car-data-index", "row-0");
        let c = QdrantBackend::point_id("car-data-index", "row-1");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_point_id_scoped_by_index() {
        assert_ne!(
            QdrantBackend::point_id("a", "row-0"),
            QdrantBackend::point_id("b", "row-0")
        );
    }

    #[test]
    fn test_distance_mapping() {
        assert_eq!(QdrantBackend::distance(Metric::Cosine), Distance::Cosine);
        assert_eq!(QdrantBackend::distance(Metric::Euclidean), Distance::Euclid);
        assert_eq!(QdrantBackend::distance(Metric::Dot), Distance::Dot);
    }

    #[test]
    fn test_point_payload() {
        let entry = IndexEntry::new(42, vec![0.5; 4], "Name: volvo 145e", 512);
        let point = QdrantBackend::to_point("cars", entry);

        assert_eq!(payload_str(&point.payload, "entry_id").as_deref(), Some("row-42"));
        assert_eq!(payload_u64(&point.payload, "row_index"), Some(42));
        assert_eq!(
            payload_str(&point.payload, "text").as_deref(),
            Some("Name: volvo 145e")
        );
    }

    #[test]
    fn test_backend_creation_is_lazy() {
        let config = IndexConfig::default();
        assert!(QdrantBackend::new(&config).is_ok());
    }
}
